//! HTTP 错误响应辅助函数
//!
//! 所有错误统一返回 ApiResponse 格式，引擎错误按类别映射到 HTTP 状态码。

use api_contract::ApiResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use twin_engine::EngineError;

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

/// 引擎错误响应
pub fn engine_error(err: EngineError) -> Response {
    let message = err.to_string();
    match err {
        EngineError::InvalidParameters(_) => bad_request_error(message),
        EngineError::NoSuchDevice(_) | EngineError::NoSuchDeviceModel(_) => {
            error_response(StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND", message)
        }
        EngineError::CoreNotReady => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "CORE.NOT_READY", message)
        }
        EngineError::EdgeNotOnline(_) | EngineError::DeviceOffline(_) => {
            error_response(StatusCode::CONFLICT, "DEVICE.UNAVAILABLE", message)
        }
        EngineError::Timeout => error_response(StatusCode::GATEWAY_TIMEOUT, "EDGE.TIMEOUT", message),
        EngineError::EdgeReplied { .. }
        | EngineError::ChannelClosed
        | EngineError::InvalidResponseShape(_)
        | EngineError::AlreadyRegistered(_)
        | EngineError::Transport(_) => {
            error_response(StatusCode::BAD_GATEWAY, "EDGE.ERROR", message)
        }
        EngineError::Storage(_) | EngineError::Encode(_) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR", message)
        }
    }
}
