//! edge 通信契约（报文信封、topic、回复码、操作解码）与 HTTP 响应封装。

pub mod envelope;
pub mod http;
pub mod operation;
pub mod topic;

pub use envelope::{Message, ReplyCode, Request, RequestPayload, Response, ResponsePayload};
pub use http::{ApiError, ApiResponse, DesiredTwinsRequest};
pub use operation::{EdgeRequest, Operation, Report, ReportResource};
pub use topic::TopicScheme;

/// 契约层错误。
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("unknown report resource: {0}")]
    UnknownResource(String),
    #[error("invalid topic: {0}")]
    InvalidTopic(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// 新的关联 ID（uuid v4，去掉连字符）。
pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
