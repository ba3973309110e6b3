//! 设备生命周期 handlers
//!
//! - POST /devices/{id}/actions/{action} - create/start/stop/update/delete

use crate::AppState;
use crate::utils::response::{bad_request_error, engine_error};
use api_contract::ApiResponse;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use twin_engine::DeviceAction;

#[derive(serde::Deserialize)]
pub struct DeviceActionPath {
    device_id: String,
    action: String,
}

pub async fn device_action(
    State(state): State<AppState>,
    Path(path): Path<DeviceActionPath>,
) -> Response {
    let action: DeviceAction = match path.action.parse() {
        Ok(action) => action,
        Err(err) => return bad_request_error(err.to_string()),
    };
    match state.engine.do_device_action(&path.device_id, action).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "device_id": path.device_id,
                "action": action.as_str(),
            }))),
        )
            .into_response(),
        Err(err) => engine_error(err),
    }
}
