//! 查询执行服务模块

use std::sync::Arc;
use std::time::Instant;

use tracing::info;
use validator::Validate;

use common::config::DatabaseSettings;
use common::errors::AppResult;
use common::models::{ExecuteQueryResponse, QueryRequest};

use crate::dispatcher::Dispatcher;
use crate::executor::EngineExecutors;
use crate::resolver::{self, ResolveRequest};

/// SQL 分发执行服务
pub struct QueryService {
    settings: Arc<DatabaseSettings>,
    dispatcher: Dispatcher,
}

impl QueryService {
    pub fn new(settings: Arc<DatabaseSettings>, executors: EngineExecutors) -> Self {
        Self {
            settings,
            dispatcher: Dispatcher::new(executors),
        }
    }

    /// 校验请求、解析目标数据库并执行 SQL
    ///
    /// Request-level failures (blank SQL, unsupported engine) are returned as
    /// errors before anything runs. Per-database failures are reported inside
    /// the response.
    pub async fn execute(&self, req: QueryRequest) -> AppResult<ExecuteQueryResponse> {
        req.validate()?;
        let started = Instant::now();

        let targets = resolver::resolve(ResolveRequest::from(&req), &self.settings)?;
        info!(
            database_type = %req.database_type,
            targets = targets.len(),
            "Dispatching query"
        );

        let results = self.dispatcher.dispatch(&targets, &req.sql_query).await;
        let response = ExecuteQueryResponse::new(req, results, started.elapsed());

        info!(
            total = response.total_databases,
            succeeded = response.successful_databases,
            failed = response.failed_databases,
            elapsed_ms = response.total_execution_time_ms,
            "Query finished"
        );
        Ok(response)
    }
}
