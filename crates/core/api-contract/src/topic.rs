//! topic 约定：
//! - 请求：`<prefix>/<edgeID>/mapper/<mapperID>/<operation>[/<resource>]`
//! - 回复：`<prefix>/<edgeID>/mapper/<mapperID>/reply`

use crate::envelope::{Message, Request, RequestPayload, Response, ResponsePayload};
use crate::operation::{Operation, REPLY_OPERATION};
use crate::ContractError;

pub const DEFAULT_SERVER_PREFIX: &str = "adv/ithings/server";
pub const DEFAULT_EDGE_PREFIX: &str = "adv/ithings/edge";

/// 服务端发布 / edge 发布两侧的 topic 前缀。
#[derive(Debug, Clone)]
pub struct TopicScheme {
    server_prefix: String,
    edge_prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_PREFIX, DEFAULT_EDGE_PREFIX)
    }
}

impl TopicScheme {
    pub fn new(server_prefix: impl Into<String>, edge_prefix: impl Into<String>) -> Self {
        Self {
            server_prefix: server_prefix.into().trim_end_matches('/').to_string(),
            edge_prefix: edge_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// 服务端订阅的 topic 过滤器。
    pub fn subscription(&self) -> String {
        format!("{}/#", self.edge_prefix)
    }

    /// 服务端发出的消息 topic。
    pub fn outbound_topic(&self, message: &Message) -> String {
        match message {
            Message::Request(req) => request_topic(&self.server_prefix, req),
            Message::Response(resp) => reply_topic(&self.server_prefix, resp),
        }
    }

    pub fn outbound_payload(&self, message: &Message) -> Result<Vec<u8>, ContractError> {
        let encoded = match message {
            Message::Request(req) => serde_json::to_vec(&req.payload),
            Message::Response(resp) => serde_json::to_vec(&resp.payload),
        };
        encoded.map_err(|err| ContractError::Encode(err.to_string()))
    }

    /// 解析 edge 发来的消息。
    pub fn parse_inbound(&self, topic: &str, payload: &[u8]) -> Result<Message, ContractError> {
        parse_message(&self.edge_prefix, topic, payload)
    }

    /// 解析服务端发出的消息（edge 侧或测试使用）。
    pub fn parse_outbound(&self, topic: &str, payload: &[u8]) -> Result<Message, ContractError> {
        parse_message(&self.server_prefix, topic, payload)
    }

    /// edge 侧发布时使用的 topic。
    pub fn edge_topic(&self, message: &Message) -> String {
        match message {
            Message::Request(req) => request_topic(&self.edge_prefix, req),
            Message::Response(resp) => reply_topic(&self.edge_prefix, resp),
        }
    }
}

fn request_topic(prefix: &str, req: &Request) -> String {
    let mut topic = format!(
        "{}/{}/mapper/{}/{}",
        prefix,
        req.edge_id,
        req.mapper_id,
        req.operation.as_str()
    );
    if !req.resource.is_empty() {
        topic.push('/');
        topic.push_str(&req.resource);
    }
    topic
}

fn reply_topic(prefix: &str, resp: &Response) -> String {
    format!(
        "{}/{}/mapper/{}/{}",
        prefix, resp.edge_id, resp.mapper_id, REPLY_OPERATION
    )
}

fn parse_message(prefix: &str, topic: &str, payload: &[u8]) -> Result<Message, ContractError> {
    let rest = topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| ContractError::InvalidTopic(topic.to_string()))?;
    let mut levels = rest.splitn(5, '/');
    let edge_id = levels.next().unwrap_or_default();
    let marker = levels.next().unwrap_or_default();
    let mapper_id = levels.next().unwrap_or_default();
    let operation = levels.next().unwrap_or_default();
    let resource = levels.next().unwrap_or_default();
    if edge_id.is_empty() || marker != "mapper" || mapper_id.is_empty() || operation.is_empty() {
        return Err(ContractError::InvalidTopic(topic.to_string()));
    }

    if operation == REPLY_OPERATION {
        let payload: ResponsePayload = serde_json::from_slice(payload)
            .map_err(|err| ContractError::InvalidPayload(err.to_string()))?;
        return Ok(Message::Response(Response {
            edge_id: edge_id.to_string(),
            mapper_id: mapper_id.to_string(),
            payload,
        }));
    }

    let operation = operation.parse::<Operation>()?;
    let payload: RequestPayload = serde_json::from_slice(payload)
        .map_err(|err| ContractError::InvalidPayload(err.to_string()))?;
    Ok(Message::Request(Request {
        edge_id: edge_id.to_string(),
        mapper_id: mapper_id.to_string(),
        operation,
        resource: resource.to_string(),
        payload,
    }))
}
