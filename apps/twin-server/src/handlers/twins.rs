//! 设备孪生 handlers
//!
//! - GET /devices/{id}/twin - 上报历史与有效期内的期望值
//! - GET /devices/{id}/twin/desired - 有效期内的期望值
//! - PUT /devices/{id}/twin/desired - 更新期望值，设备在线时立即下发

use crate::AppState;
use crate::utils::response::engine_error;
use api_contract::{ApiResponse, DesiredTwinsRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(serde::Deserialize)]
pub struct DevicePath {
    device_id: String,
}

pub async fn get_device_twin(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
) -> Response {
    match state.engine.get_device_twin(&path.device_id).await {
        Ok(twin) => (StatusCode::OK, Json(ApiResponse::success(twin))).into_response(),
        Err(err) => engine_error(err),
    }
}

pub async fn get_desired_twins(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
) -> Response {
    match state.engine.desired_twins(&path.device_id).await {
        Ok(desired) => (StatusCode::OK, Json(ApiResponse::success(desired))).into_response(),
        Err(err) => engine_error(err),
    }
}

/// 更新期望值
///
/// 期望值先合并进本地孪生；设备离线时不下发，待设备上线后补推。
/// 下发失败进入重试队列，不影响本次响应。
pub async fn update_desired_twins(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    Json(req): Json<DesiredTwinsRequest>,
) -> Response {
    let accepted = req.desired_twins.len();
    match state
        .engine
        .update_desired_twins(&path.device_id, req.desired_twins)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "accepted": accepted }))),
        )
            .into_response(),
        Err(err) => engine_error(err),
    }
}
