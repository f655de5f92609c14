//! 数据库执行器模块
//!
//! One [`QueryExecutor`] per engine. Each call opens its own connection, runs
//! the statement and closes the connection again; nothing is pooled or shared
//! between targets.

mod postgres;
mod sqlserver;

use std::sync::Arc;

use async_trait::async_trait;

use common::errors::AppResult;
use common::models::{DatabaseTarget, Engine, QueryData};

pub use postgres::PostgresExecutor;
pub use sqlserver::SqlServerExecutor;

/// Runs one SQL statement against one database.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes `sql` on `target`, returning rows for `SELECT`/`WITH`
    /// statements and an affected-row count otherwise.
    async fn execute(&self, target: &DatabaseTarget, sql: &str) -> AppResult<QueryData>;
}

/// Picks the executor matching a target's engine.
#[derive(Clone)]
pub struct EngineExecutors {
    sql_server: Arc<dyn QueryExecutor>,
    postgres: Arc<dyn QueryExecutor>,
}

impl EngineExecutors {
    pub fn new(sql_server: Arc<dyn QueryExecutor>, postgres: Arc<dyn QueryExecutor>) -> Self {
        Self {
            sql_server,
            postgres,
        }
    }

    /// Executors backed by the real database drivers.
    pub fn native() -> Self {
        Self::new(Arc::new(SqlServerExecutor), Arc::new(PostgresExecutor))
    }

    pub fn for_engine(&self, engine: Engine) -> Arc<dyn QueryExecutor> {
        match engine {
            Engine::SqlServer => Arc::clone(&self.sql_server),
            Engine::PostgreSQL => Arc::clone(&self.postgres),
        }
    }
}

/// Splits a `key=value;key=value` string into trimmed pairs, keys lowercased.
///
/// Tokens without `=` are ignored.
pub(crate) fn connection_pairs(connection_string: &str) -> Vec<(String, &str)> {
    connection_string
        .split(';')
        .filter_map(|token| token.split_once('='))
        .map(|(key, value)| (key.trim().to_lowercase(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
