//! HTTP 响应封装与请求体。

use domain::TwinProperty;
use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 期望值更新请求体。
#[derive(Debug, Deserialize)]
pub struct DesiredTwinsRequest {
    #[serde(alias = "desiredTwins")]
    pub desired_twins: Vec<TwinProperty>,
}
