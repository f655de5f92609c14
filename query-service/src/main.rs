//! 多数据库 SQL 分发执行服务
//!
//! 提供以下功能：
//! - 解析请求中的数据库目标（多连接文本 / 自定义连接串 / 静态配置）
//! - 连接字符串清洗与数据库类型识别
//! - 在 SQL Server 与 PostgreSQL 上并发执行同一条 SQL，逐库汇报结果

mod dispatcher;
mod executor;
mod handlers;
mod resolver;
mod routes;
mod service;
mod state;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

pub(crate) const SERVICE_NAME: &str = "query-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "查询服务 API",
        version = "0.1.0",
        description = "多数据库 SQL 分发执行微服务"
    ),
    paths(
        handlers::execute_query,
        handlers::health_check,
    ),
    components(schemas(
        common::models::QueryRequest,
        common::models::ExecuteQueryResponse,
        common::models::TargetOutcome,
        common::models::Engine,
        handlers::HealthResponse,
    )),
    tags(
        (name = "query", description = "查询执行端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);

    // 初始化日志追踪
    init_tracing(config.json_logs);

    // 创建应用状态
    let state = AppState::new(&config).context("加载数据库配置失败")?;

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_address();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app).await.context("服务启动失败")?;
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let (text_layer, json_layer) = if json_logs {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use common::config::{DatabaseSection, DatabaseSettings};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::executor::testing::stub_executors;

    fn app() -> Router {
        let settings = DatabaseSettings::new(vec![DatabaseSection::new("Orders")
            .with("Type", "SqlServer")
            .with("ConnectionString", "Server=a")]);
        create_router(AppState::with_parts(settings, stub_executors()))
    }

    async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-request-id", "req-1")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_execute_against_static_config() {
        let (status, body) = post("/api/query/execute", json!({ "sqlQuery": "SELECT 1" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["meta"]["request_id"], "req-1");
        assert_eq!(body["data"]["databaseType"], "both");
        assert_eq!(body["data"]["totalDatabases"], 1);
        assert_eq!(body["data"]["results"][0]["databaseName"], "Orders_Default");
        assert_eq!(body["data"]["results"][0]["data"][0]["target"], "Orders_Default");
    }

    #[tokio::test]
    async fn test_bare_string_body_on_alias_route() {
        let (status, body) = post("/api/query", json!("SELECT 1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["sqlQuery"], "SELECT 1");
        assert_eq!(body["data"]["successfulDatabases"], 1);
    }

    #[tokio::test]
    async fn test_multiple_connections_report_partial_failure() {
        let (status, body) = post(
            "/api/query/execute",
            json!({
                "sqlQuery": "SELECT 1",
                "multipleConnections": "{\"A\":\"Host=x;Port=5432\",\"B\":\"Server=fail\"}"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalDatabases"], 2);
        assert_eq!(body["data"]["failedDatabases"], 1);
        assert_eq!(body["data"]["results"][0]["databaseName"], "A");
        assert_eq!(body["data"]["results"][1]["success"], false);
        assert_eq!(body["data"]["results"][1]["executionTimeMs"], 0);
    }

    #[tokio::test]
    async fn test_blank_sql_returns_bad_request() {
        let (status, body) = post("/api/query/execute", json!({ "sqlQuery": "  " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_sql_returns_bad_request() {
        let (status, body) = post("/api/query/execute", json!({ "databaseType": "both" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("SQL query is required"));
    }

    #[tokio::test]
    async fn test_custom_connection_with_both_returns_bad_request() {
        let (status, body) = post(
            "/api/query/execute",
            json!({ "sqlQuery": "SELECT 1", "customConnectionString": "Server=x" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_ENGINE");
    }

    #[tokio::test]
    async fn test_health_and_openapi() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app()
            .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/api/query/execute"].is_object());
    }
}
