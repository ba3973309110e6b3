//! # 消息关联层
//!
//! 把"异步发布 + 异步回复"变成带超时的同步调用：
//! 发送方以请求 ID 注册监听器后再发布，回复按 pid 分发到对应监听器。
//!
//! - 每个 ID 至多一个监听器，重复注册被拒绝
//! - 未知 ID 的回复静默丢弃
//! - 监听器被丢弃（超时、调用方取消）时自动注销

mod error;
mod registry;

pub use error::CorrelationError;
pub use registry::{Listener, ListenerRegistry};
