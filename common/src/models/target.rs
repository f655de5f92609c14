//! Resolved database targets.
//!
//! A [`DatabaseTarget`] is built fresh for every request and handed to the
//! dispatcher; it is never persisted.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

/// Supported database engines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum Engine {
    /// Microsoft SQL Server.
    SqlServer,
    /// PostgreSQL.
    PostgreSQL,
}

impl Engine {
    /// Parses an explicit engine name, case-insensitively.
    ///
    /// # Errors
    /// Returns `AppError::UnsupportedEngine` for anything other than
    /// `sqlserver` or `postgresql`.
    pub fn parse(name: &str) -> AppResult<Self> {
        match name.to_lowercase().as_str() {
            "sqlserver" => Ok(Engine::SqlServer),
            "postgresql" => Ok(Engine::PostgreSQL),
            _ => Err(AppError::UnsupportedEngine(name.to_string())),
        }
    }

    /// Guesses the engine from the shape of a sanitized connection string.
    ///
    /// `host=`, or `server=` together with `port=`, means PostgreSQL. Anything
    /// else is SQL Server.
    pub fn detect(connection_string: &str) -> Self {
        let lower = connection_string.to_lowercase();
        let has_server = lower.contains("server=");
        if lower.contains("host=") || (has_server && lower.contains("port=")) {
            Engine::PostgreSQL
        } else {
            Engine::SqlServer
        }
    }

    /// Default TCP port of the engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Engine::SqlServer => 1433,
            Engine::PostgreSQL => 5432,
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::SqlServer => write!(f, "SqlServer"),
            Engine::PostgreSQL => write!(f, "PostgreSQL"),
        }
    }
}

/// One resolved, typed database the SQL statement will be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTarget {
    /// Unique name within one resolution.
    pub name: String,
    pub engine: Engine,
    /// Normalized connection string handed to the driver.
    #[serde(skip_serializing)]
    pub connection_string: String,
    pub enabled: bool,
    /// Upper bound for connect + execute, `0` means unbounded.
    pub timeout_seconds: u64,
}

impl DatabaseTarget {
    /// Timeout applied to targets that do not come from static configuration.
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

    /// Creates an enabled target with the default timeout.
    pub fn new(name: impl Into<String>, engine: Engine, connection_string: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine,
            connection_string: connection_string.into(),
            enabled: true,
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// A `(label, raw connection string)` pair read from a multi-connection blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConnectionEntry {
    pub label: String,
    pub raw_value: String,
}

impl RawConnectionEntry {
    pub fn new(label: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            raw_value: raw_value.into(),
        }
    }
}
