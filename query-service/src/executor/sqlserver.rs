//! SQL Server executor backed by tiberius.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tiberius::{Client, ColumnData, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use common::errors::{AppError, AppResult};
use common::models::{CellValue, DatabaseTarget, QueryData, Row};
use common::utils::SqlValidator;

use super::QueryExecutor;

type MssqlClient = Client<Compat<TcpStream>>;

/// Runs statements on SQL Server over a single TDS connection.
pub struct SqlServerExecutor;

impl SqlServerExecutor {
    /// Rewrites a sanitized connection string into the ADO.NET form tiberius
    /// understands: `Host`/`Port` fold into `Server=host,port` and `Username`
    /// becomes `User ID`.
    ///
    /// Strings without those keys are returned untouched. Otherwise only the
    /// rewritten keys change; every other token, including braced or quoted
    /// values containing `;`, is kept verbatim.
    pub fn ado_string(connection_string: &str) -> String {
        let tokens = split_ado_tokens(connection_string);
        let needs_rewrite = tokens.iter().any(|token| {
            matches!(token_key(token).as_deref(), Some("host" | "port" | "username"))
        });
        if !needs_rewrite {
            return connection_string.to_string();
        }

        let mut server = None;
        let mut port = None;
        let mut parts = Vec::new();
        for token in tokens {
            let value = token.split_once('=').map_or("", |(_, v)| v.trim());
            match token_key(token).as_deref() {
                Some("host" | "server" | "data source") => server = Some(value),
                Some("port") => port = Some(value),
                Some("username") => parts.push(format!("User ID={}", value)),
                _ => parts.push(token.trim().to_string()),
            }
        }

        if let Some(server) = server {
            let server = match port {
                Some(port) if !server.contains(',') => format!("{},{}", server, port),
                _ => server.to_string(),
            };
            parts.insert(0, format!("Server={}", server));
        }
        parts.join(";")
    }

    pub fn build_config(connection_string: &str) -> AppResult<Config> {
        Config::from_ado_string(&Self::ado_string(connection_string))
            .map_err(|e| AppError::Validation(format!("invalid SQL Server connection string: {}", e)))
    }

    /// Opens a client, following one Azure-style routing redirect.
    async fn connect(mut config: Config) -> AppResult<MssqlClient> {
        let tcp = open_tcp(&config).await?;
        match Client::connect(config.clone(), tcp.compat_write()).await {
            Ok(client) => Ok(client),
            Err(tiberius::error::Error::Routing { host, port }) => {
                tracing::debug!(host = %host, port, "SQL Server routing redirect");
                config.host(&host);
                config.port(port);
                let tcp = open_tcp(&config).await?;
                Client::connect(config, tcp.compat_write())
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))
            }
            Err(e) => Err(AppError::DatabaseConnection(e.to_string())),
        }
    }
}

/// Splits on `;` outside `{...}`, `"..."` and `'...'` values.
fn split_ado_tokens(connection_string: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut closing: Option<char> = None;
    let mut after_equals = false;
    let mut start = 0;

    for (i, c) in connection_string.char_indices() {
        match closing {
            Some(close) => {
                if c == close {
                    closing = None;
                }
            }
            None => match c {
                ';' => {
                    tokens.push(&connection_string[start..i]);
                    start = i + 1;
                    after_equals = false;
                    continue;
                }
                '{' if after_equals => closing = Some('}'),
                '"' | '\'' if after_equals => closing = Some(c),
                _ => {}
            },
        }
        if c == '=' && closing.is_none() {
            after_equals = true;
        } else if !c.is_whitespace() {
            after_equals = false;
        }
    }
    tokens.push(&connection_string[start..]);
    tokens.retain(|token| !token.trim().is_empty());
    tokens
}

fn token_key(token: &str) -> Option<String> {
    token
        .split_once('=')
        .map(|(key, _)| key.trim().to_lowercase())
}

async fn open_tcp(config: &Config) -> AppResult<TcpStream> {
    let addr = config.get_addr();
    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|e| AppError::DatabaseConnection(format!("Failed to connect to {} - {}", addr, e)))?;
    tcp.set_nodelay(true).ok();
    Ok(tcp)
}

#[async_trait]
impl QueryExecutor for SqlServerExecutor {
    async fn execute(&self, target: &DatabaseTarget, sql: &str) -> AppResult<QueryData> {
        let config = Self::build_config(&target.connection_string)?;
        let mut client = Self::connect(config).await?;

        let result = run_statement(&mut client, sql).await;

        if let Err(e) = client.close().await {
            tracing::debug!(target_name = %target.name, error = %e, "SQL Server connection close failed");
        }
        result
    }
}

async fn run_statement(client: &mut MssqlClient, sql: &str) -> AppResult<QueryData> {
    if SqlValidator::returns_rows(sql) {
        let rows = client
            .simple_query(sql)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        Ok(QueryData::Rows(rows.iter().map(convert_row).collect()))
    } else {
        let done = client
            .execute(sql, &[])
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        Ok(QueryData::Affected {
            affected_rows: done.total(),
        })
    }
}

fn convert_row(row: &tiberius::Row) -> Row {
    row.cells()
        .enumerate()
        .map(|(i, (column, data))| {
            let value = match data {
                ColumnData::DateTime(Some(_))
                | ColumnData::SmallDateTime(Some(_))
                | ColumnData::DateTime2(Some(_)) => row
                    .try_get::<chrono::NaiveDateTime, _>(i)
                    .ok()
                    .flatten()
                    .map(|dt| CellValue::Date(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                    .unwrap_or(CellValue::Null),
                ColumnData::DateTimeOffset(Some(_)) => row
                    .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
                    .ok()
                    .flatten()
                    .map(|dt| CellValue::Date(dt.to_rfc3339()))
                    .unwrap_or(CellValue::Null),
                ColumnData::Date(Some(_)) => row
                    .try_get::<chrono::NaiveDate, _>(i)
                    .ok()
                    .flatten()
                    .map(|d| CellValue::Date(d.format("%Y-%m-%d").to_string()))
                    .unwrap_or(CellValue::Null),
                ColumnData::Time(Some(_)) => row
                    .try_get::<chrono::NaiveTime, _>(i)
                    .ok()
                    .flatten()
                    .map(|t| CellValue::Date(t.format("%H:%M:%S%.f").to_string()))
                    .unwrap_or(CellValue::Null),
                _ => convert_column_data(data),
            };
            (column.name().to_string(), value)
        })
        .collect()
}

fn convert_column_data(data: &ColumnData<'_>) -> CellValue {
    match data {
        ColumnData::Bit(Some(b)) => CellValue::Bool(*b),
        ColumnData::U8(Some(v)) => CellValue::Integer((*v).into()),
        ColumnData::I16(Some(v)) => CellValue::Integer((*v).into()),
        ColumnData::I32(Some(v)) => CellValue::Integer((*v).into()),
        ColumnData::I64(Some(v)) => CellValue::Integer(*v),
        ColumnData::F32(Some(v)) => CellValue::Float((*v).into()),
        ColumnData::F64(Some(v)) => CellValue::Float(*v),
        ColumnData::Numeric(Some(n)) => numeric_value(n.value(), n.scale()),
        ColumnData::String(Some(s)) => CellValue::Text(s.to_string()),
        ColumnData::Guid(Some(g)) => CellValue::Text(g.to_string()),
        ColumnData::Binary(Some(b)) => CellValue::Binary(b.to_vec()),
        ColumnData::Xml(Some(xml)) => CellValue::Text(xml.to_string()),
        _ => CellValue::Null,
    }
}

fn numeric_value(value: i128, scale: u8) -> CellValue {
    let as_float = Decimal::try_from_i128_with_scale(value, scale.into())
        .ok()
        .and_then(|d| d.to_f64())
        .unwrap_or_else(|| value as f64 / 10f64.powi(scale.into()));
    CellValue::Float(as_float)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ado_string_maps_sanitized_keys() {
        let ado = SqlServerExecutor::ado_string(
            "Host=db.local;Port=1444;Username=sa;Password=secret;Database=sales",
        );
        assert_eq!(
            ado,
            "Server=db.local,1444;User ID=sa;Password=secret;Database=sales"
        );
    }

    #[test]
    fn test_ado_string_keeps_explicit_server_port() {
        let ado = SqlServerExecutor::ado_string("Server=tcp:sql,1500;Port=9;Encrypt=true");
        assert_eq!(ado, "Server=tcp:sql,1500;Encrypt=true");
    }

    #[test]
    fn test_ado_string_passes_ado_strings_through() {
        let raw = "Server=sql;User ID=sa;Password={a;b};Database=x";
        assert_eq!(SqlServerExecutor::ado_string(raw), raw);
    }

    #[test]
    fn test_ado_string_keeps_braced_and_quoted_values() {
        let ado = SqlServerExecutor::ado_string(
            "Host=h;Username=u;Password={a;b};Application Name='x;y'",
        );
        assert_eq!(ado, "Server=h;User ID=u;Password={a;b};Application Name='x;y'");
    }

    #[test]
    fn test_split_ado_tokens() {
        assert_eq!(
            split_ado_tokens("A=1; B = \"x;y\" ;C={p;q};;D=it's"),
            vec!["A=1", " B = \"x;y\" ", "C={p;q}", "D=it's"]
        );
    }

    #[test]
    fn test_build_config_address() {
        let config =
            SqlServerExecutor::build_config("Server=sql.internal;Username=sa;Password=x").unwrap();
        assert_eq!(config.get_addr(), "sql.internal:1433");

        let config = SqlServerExecutor::build_config("Host=sql.internal;Port=1500").unwrap();
        assert_eq!(config.get_addr(), "sql.internal:1500");
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value(12345, 2), CellValue::Float(123.45));
        assert_eq!(numeric_value(-5, 0), CellValue::Float(-5.0));
    }

    #[test]
    fn test_convert_column_data() {
        assert_eq!(convert_column_data(&ColumnData::Bit(Some(true))), CellValue::Bool(true));
        assert_eq!(convert_column_data(&ColumnData::I32(Some(7))), CellValue::Integer(7));
        assert_eq!(convert_column_data(&ColumnData::I32(None)), CellValue::Null);
        assert_eq!(
            convert_column_data(&ColumnData::String(Some("x".into()))),
            CellValue::Text("x".into())
        );
    }
}
