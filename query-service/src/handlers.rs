//! Handler模块

use std::time::Instant;

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::middleware::RequestId;
use common::models::{ExecuteQueryResponse, QueryRequest, QueryRequestBody};
use common::response::ApiResponse;

use crate::service::QueryService;
use crate::state::AppState;
use crate::SERVICE_NAME;

/// 在多个数据库上执行 SQL
///
/// 请求体可以是完整的 `QueryRequest` 对象，也可以是只包含 SQL 的 JSON 字符串。
#[utoipa::path(
    post,
    path = "/api/query/execute",
    tag = "query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "已在所有目标数据库上执行（单库失败见 results）", body = ApiResponse<ExecuteQueryResponse>),
        (status = 400, description = "SQL 为空或数据库类型不支持")
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<QueryRequestBody>,
) -> Result<Json<ApiResponse<ExecuteQueryResponse>>, AppError> {
    let started = Instant::now();
    let service = QueryService::new(state.settings.clone(), state.executors.clone());

    let result = service.execute(body.into_request()).await?;
    Ok(Json(
        ApiResponse::ok_with_service(result, SERVICE_NAME)
            .with_request_id(request_id.as_str())
            .with_duration(started.elapsed().as_millis() as u64),
    ))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        configured_sections: state.settings.sections().len(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub configured_sections: usize,
    pub timestamp: DateTime<Utc>,
}
