//! 健康检查与指标快照。
//!
//! - GET /health
//! - GET /metrics

use crate::AppState;
use api_contract::ApiResponse;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use twin_telemetry::metrics;

/// 分发循环未启动时返回 503，便于探针区分存活与就绪。
pub async fn health(State(state): State<AppState>) -> Response {
    let ready = state.engine.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(serde_json::json!({ "ok": ready }))).into_response()
}

pub async fn get_metrics() -> Response {
    (StatusCode::OK, Json(ApiResponse::success(metrics().snapshot()))).into_response()
}
