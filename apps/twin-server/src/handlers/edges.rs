//! Edge 在线状态 handlers
//!
//! 由 edge 连接管理组件回调：
//! - POST /edges/{id}/status - 上报 edge 在线/离线
//! - POST /edges/{id}/offline - edge 失联，批量置设备离线

use crate::AppState;
use crate::utils::response::engine_error;
use api_contract::ApiResponse;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(serde::Deserialize)]
pub struct EdgePath {
    edge_id: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct EdgeStatusRequest {
    pub online: bool,
}

pub async fn set_edge_status(
    State(state): State<AppState>,
    Path(path): Path<EdgePath>,
    Json(req): Json<EdgeStatusRequest>,
) -> Response {
    match state
        .engine
        .set_edge_presence(&path.edge_id, req.online)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "edge_id": path.edge_id,
                "online": req.online,
            }))),
        )
            .into_response(),
        Err(err) => engine_error(err),
    }
}

pub async fn mark_edge_offline(
    State(state): State<AppState>,
    Path(path): Path<EdgePath>,
) -> Response {
    match state.engine.mark_edge_offline(&path.edge_id).await {
        Ok(affected) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "edge_id": path.edge_id,
                "devices": affected,
            }))),
        )
            .into_response(),
        Err(err) => engine_error(err),
    }
}
