//! SQL query models.
//!
//! Contains the fan-out request, the per-database outcome, and the aggregate
//! response returned to the caller.

use std::borrow::Cow;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Filter value meaning "every configured engine".
pub const ALL_ENGINES: &str = "both";

/// Request body for running one SQL statement against many databases.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// SQL statement to execute. A missing field reads as blank and is
    /// rejected by validation.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "SQL query is required"))]
    pub sql_query: String,

    /// `both`, `sqlserver` or `postgresql`.
    #[serde(default = "default_database_type")]
    pub database_type: String,

    /// Single ad-hoc connection string, used as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_connection_string: Option<String>,

    /// JSON object of `label -> connection string`, or one connection per line
    /// (optionally `Label: connection string`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_connections: Option<String>,

    /// Engine forced for every entry of `multipleConnections`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_connections_db_type: Option<String>,
}

fn default_database_type() -> String {
    ALL_ENGINES.to_string()
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

impl QueryRequest {
    /// Creates a request for the static configuration with the `both` filter.
    pub fn new(sql_query: impl Into<String>) -> Self {
        Self {
            sql_query: sql_query.into(),
            database_type: default_database_type(),
            custom_connection_string: None,
            multiple_connections: None,
            multiple_connections_db_type: None,
        }
    }
}

/// Accepted request payloads: the full object, or a bare JSON string holding
/// only the SQL statement.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QueryRequestBody {
    Full(QueryRequest),
    Sql(String),
}

impl QueryRequestBody {
    pub fn into_request(self) -> QueryRequest {
        match self {
            QueryRequestBody::Full(req) => req,
            QueryRequestBody::Sql(sql) => QueryRequest::new(sql.trim_matches('"')),
        }
    }
}

/// A single cell read from a driver row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Serialized as base64.
    Binary(#[serde(serialize_with = "serialize_base64")] Vec<u8>),
    /// ISO-8601 date, time or timestamp.
    Date(String),
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// One result row, columns in select-list order.
pub type Row = IndexMap<String, CellValue>;

/// What a statement produced on one database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryData {
    /// Tabular result of a row-returning statement.
    Rows(Vec<Row>),
    /// Row count of a data-modifying statement.
    Affected {
        #[serde(rename = "affectedRows")]
        affected_rows: u64,
    },
}

impl QueryData {
    /// Returned row count, or affected row count for non-queries.
    pub fn row_count(&self) -> u64 {
        match self {
            QueryData::Rows(rows) => rows.len() as u64,
            QueryData::Affected { affected_rows } => *affected_rows,
        }
    }
}

/// Outcome of the statement on a single database.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetOutcome {
    /// Resolved target name.
    pub database_name: String,
    pub success: bool,
    /// Rows, or `{ "affectedRows": n }` for non-queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<QueryData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock execution time, `0` on failure.
    pub execution_time_ms: u64,
}

impl TargetOutcome {
    pub fn success(database_name: impl Into<String>, data: QueryData, elapsed: Duration) -> Self {
        Self {
            database_name: database_name.into(),
            success: true,
            row_count: Some(data.row_count()),
            data: Some(data),
            error: None,
            execution_time_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failure<'a>(database_name: impl Into<String>, error: impl Into<Cow<'a, str>>) -> Self {
        Self {
            database_name: database_name.into(),
            success: false,
            data: None,
            row_count: None,
            error: Some(error.into().into_owned()),
            execution_time_ms: 0,
        }
    }
}

/// Aggregate result of one fan-out request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueryResponse {
    pub sql_query: String,
    pub database_type: String,
    pub total_execution_time_ms: u64,
    pub total_databases: usize,
    pub successful_databases: usize,
    pub failed_databases: usize,
    /// One entry per resolved database, in resolution order.
    pub results: Vec<TargetOutcome>,
}

impl ExecuteQueryResponse {
    pub fn new(request: QueryRequest, results: Vec<TargetOutcome>, elapsed: Duration) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            sql_query: request.sql_query,
            database_type: request.database_type,
            total_execution_time_ms: elapsed.as_millis() as u64,
            total_databases: results.len(),
            successful_databases: successful,
            failed_databases: results.len() - successful,
            results,
        }
    }
}
