//! PostgreSQL executor backed by sqlx.

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgRow, PgSslMode};
use sqlx::{Column, Connection, PgConnection, Row as _, TypeInfo};

use common::errors::{AppError, AppResult};
use common::models::{CellValue, DatabaseTarget, Engine, QueryData, Row};
use common::utils::SqlValidator;

use super::{connection_pairs, QueryExecutor};

/// Runs statements on PostgreSQL over a dedicated `PgConnection`.
pub struct PostgresExecutor;

impl PostgresExecutor {
    /// Builds connect options from a `key=value;` string or a `postgres://` URL.
    ///
    /// Recognized keys (case-insensitive): `Host`/`Server`, `Port`,
    /// `Username`/`User Id`/`User`, `Password`, `Database`/`Initial Catalog`,
    /// `SSL Mode`/`SslMode`, `Application Name`. Other keys are ignored.
    pub fn connect_options(connection_string: &str) -> AppResult<PgConnectOptions> {
        let trimmed = connection_string.trim();
        if trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://") {
            return PgConnectOptions::from_str(trimmed)
                .map_err(|e| AppError::Validation(format!("invalid PostgreSQL URL: {}", e)));
        }

        let mut options = PgConnectOptions::new().port(Engine::PostgreSQL.default_port());
        for (key, value) in connection_pairs(trimmed) {
            options = match key.as_str() {
                "host" | "server" => options.host(value),
                "port" => options.port(value.parse().map_err(|_| {
                    AppError::Validation(format!("invalid PostgreSQL port: {}", value))
                })?),
                "username" | "user id" | "userid" | "user" => options.username(value),
                "password" => options.password(value),
                "database" | "initial catalog" => options.database(value),
                "ssl mode" | "sslmode" => options.ssl_mode(PgSslMode::from_str(value).map_err(
                    |e| AppError::Validation(format!("invalid PostgreSQL SSL mode: {}", e)),
                )?),
                "application name" => options.application_name(value),
                _ => options,
            };
        }
        Ok(options)
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, target: &DatabaseTarget, sql: &str) -> AppResult<QueryData> {
        let options = Self::connect_options(&target.connection_string)?;
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;

        let result = run_statement(&mut conn, sql).await;

        if let Err(e) = conn.close().await {
            tracing::debug!(target_name = %target.name, error = %e, "PostgreSQL connection close failed");
        }
        result
    }
}

async fn run_statement(conn: &mut PgConnection, sql: &str) -> AppResult<QueryData> {
    if SqlValidator::returns_rows(sql) {
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        Ok(QueryData::Rows(rows.iter().map(convert_row).collect()))
    } else {
        let done = sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        Ok(QueryData::Affected {
            affected_rows: done.rows_affected(),
        })
    }
}

fn convert_row(pg_row: &PgRow) -> Row {
    pg_row
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), extract_value(pg_row, col.ordinal())))
        .collect()
}

/// Reads one cell, trying the common column types in turn. NULLs come back
/// as `Ok(None)` for any compatible type.
fn extract_value(row: &PgRow, idx: usize) -> CellValue {
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(CellValue::Bool).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(CellValue::Integer).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|i| CellValue::Integer(i.into())).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(|i| CellValue::Integer(i.into())).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(CellValue::Float).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map(|f| CellValue::Float(f.into())).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(idx) {
        return v.map(decimal_value).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(CellValue::Text).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(CellValue::Binary).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<sqlx::types::Uuid>, _>(idx) {
        return v.map(|u| CellValue::Text(u.to_string())).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
        return v.map(|j| CellValue::Text(j.to_string())).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return v.map(|dt| CellValue::Date(dt.to_rfc3339())).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return v
            .map(|dt| CellValue::Date(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
        return v
            .map(|d| CellValue::Date(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
        return v
            .map(|t| CellValue::Date(t.format("%H:%M:%S%.f").to_string()))
            .unwrap_or(CellValue::Null);
    }

    tracing::debug!(
        column = idx,
        type_name = row.columns()[idx].type_info().name(),
        "Unsupported PostgreSQL column type, returning null"
    );
    CellValue::Null
}

fn decimal_value(d: Decimal) -> CellValue {
    match d.to_f64() {
        Some(f) => CellValue::Float(f),
        None => CellValue::Text(d.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_from_key_values() {
        let options = PostgresExecutor::connect_options(
            "Host=db.local;Port=6543;Username=app;Password=secret;Database=sales;Keepalive=30",
        )
        .unwrap();
        assert_eq!(options.get_host(), "db.local");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("sales"));
    }

    #[test]
    fn test_connect_options_accepts_ado_style_keys() {
        let options =
            PostgresExecutor::connect_options("Server=pg;User Id=ro;Initial Catalog=dw").unwrap();
        assert_eq!(options.get_host(), "pg");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "ro");
        assert_eq!(options.get_database(), Some("dw"));
    }

    #[test]
    fn test_connect_options_from_url() {
        let options =
            PostgresExecutor::connect_options("postgres://u:p@pghost:5433/app").unwrap();
        assert_eq!(options.get_host(), "pghost");
        assert_eq!(options.get_port(), 5433);
    }

    #[test]
    fn test_connect_options_rejects_bad_port() {
        let err = PostgresExecutor::connect_options("Host=x;Port=abc").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_decimal_value() {
        assert_eq!(decimal_value(Decimal::new(1234, 2)), CellValue::Float(12.34));
    }
}
