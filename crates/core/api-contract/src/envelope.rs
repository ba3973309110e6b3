use crate::operation::{EdgeRequest, Operation};
use crate::{ContractError, new_message_id};
use serde::{Deserialize, Serialize};

pub const OK_TEXT: &str = "success";
pub const INVALID_MESSAGE_TEXT: &str = "invalid message format";
pub const INTERNAL_ERROR_TEXT: &str = "server internal error";

/// 回复码（线上以字符串传输）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReplyCode {
    /// 200
    Ok,
    /// 201
    InvalidMessage,
    /// 202
    InternalError,
    /// 205
    Error,
    Other(String),
}

impl ReplyCode {
    pub fn as_str(&self) -> &str {
        match self {
            ReplyCode::Ok => "200",
            ReplyCode::InvalidMessage => "201",
            ReplyCode::InternalError => "202",
            ReplyCode::Error => "205",
            ReplyCode::Other(code) => code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ReplyCode::Ok)
    }
}

impl From<String> for ReplyCode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "200" => ReplyCode::Ok,
            "201" => ReplyCode::InvalidMessage,
            "202" => ReplyCode::InternalError,
            "205" => ReplyCode::Error,
            _ => ReplyCode::Other(value),
        }
    }
}

impl From<ReplyCode> for String {
    fn from(value: ReplyCode) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 请求载荷：`{"id", "content"}`，content 为 JSON 文本或纯文本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub id: String,
    #[serde(default)]
    pub content: String,
}

/// 回复载荷：`{"id", "pid", "code", "content"}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub id: String,
    pub pid: String,
    pub code: ReplyCode,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub edge_id: String,
    pub mapper_id: String,
    pub operation: Operation,
    pub resource: String,
    pub payload: RequestPayload,
}

impl Request {
    /// 构造带新关联 ID 的请求。
    pub fn new(
        edge_id: impl Into<String>,
        mapper_id: impl Into<String>,
        operation: Operation,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            edge_id: edge_id.into(),
            mapper_id: mapper_id.into(),
            operation,
            resource: resource.into(),
            payload: RequestPayload {
                id: new_message_id(),
                content: String::new(),
            },
        }
    }

    pub fn with_text(mut self, content: impl Into<String>) -> Self {
        self.payload.content = content.into();
        self
    }

    pub fn with_json<T: Serialize>(mut self, content: &T) -> Result<Self, ContractError> {
        self.payload.content =
            serde_json::to_string(content).map_err(|err| ContractError::Encode(err.to_string()))?;
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn content(&self) -> &str {
        &self.payload.content
    }

    /// 按 operation/resource 解码内容。
    pub fn decode(&self) -> Result<EdgeRequest, ContractError> {
        EdgeRequest::decode(self.operation, &self.resource, &self.payload.content)
    }

    pub fn reply(&self, code: ReplyCode, content: impl Into<String>) -> Response {
        Response {
            edge_id: self.edge_id.clone(),
            mapper_id: self.mapper_id.clone(),
            payload: ResponsePayload {
                id: new_message_id(),
                pid: self.payload.id.clone(),
                code,
                content: content.into(),
            },
        }
    }

    pub fn reply_json<T: Serialize>(
        &self,
        code: ReplyCode,
        content: &T,
    ) -> Result<Response, ContractError> {
        let content =
            serde_json::to_string(content).map_err(|err| ContractError::Encode(err.to_string()))?;
        Ok(self.reply(code, content))
    }

    pub fn reply_ok(&self) -> Response {
        self.reply(ReplyCode::Ok, OK_TEXT)
    }

    pub fn reply_invalid(&self) -> Response {
        self.reply(ReplyCode::InvalidMessage, INVALID_MESSAGE_TEXT)
    }

    pub fn reply_internal_error(&self) -> Response {
        self.reply(ReplyCode::InternalError, INTERNAL_ERROR_TEXT)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub edge_id: String,
    pub mapper_id: String,
    pub payload: ResponsePayload,
}

impl Response {
    pub fn parent_id(&self) -> &str {
        &self.payload.pid
    }

    pub fn code(&self) -> &ReplyCode {
        &self.payload.code
    }

    pub fn content(&self) -> &str {
        &self.payload.content
    }
}

/// 传输层消息：请求或回复，二者互斥。
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn edge_id(&self) -> &str {
        match self {
            Message::Request(req) => &req.edge_id,
            Message::Response(resp) => &resp.edge_id,
        }
    }
}

impl From<Request> for Message {
    fn from(value: Request) -> Self {
        Message::Request(value)
    }
}

impl From<Response> for Message {
    fn from(value: Response) -> Self {
        Message::Response(value)
    }
}
