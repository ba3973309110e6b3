//! # 传输层
//!
//! 核心只依赖 [`Transport`] 的 `send` / `receive` 两个操作：
//! - [`MqttTransport`]：rumqttc 客户端，订阅 edge 前缀并解析为 [`Message`]
//! - [`ChannelTransport`]：进程内通道对，测试与本地联调使用
//!
//! 连接建立使用 [`retry_with_backoff`]，支持取消。

mod backoff;
mod channel;
mod error;
mod mqtt;

pub use api_contract::Message;
pub use backoff::{BackoffPolicy, retry_with_backoff};
pub use channel::ChannelTransport;
pub use error::TransportError;
pub use mqtt::{MqttTransport, MqttTransportConfig};

use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), TransportError>;

    /// 下一条入站消息；传输关闭后返回 None。
    async fn receive(&self) -> Option<Message>;
}
