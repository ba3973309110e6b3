//! # 孪生同步引擎
//!
//! 云端核心：把 edge 的请求与回复分流，维护设备生命周期并同步期望值。
//!
//! - `dispatcher`：入站分发、工作池、`send_sync_request_to_edge`
//! - `handlers`：register / fetch / report 请求处理
//! - `lifecycle`：设备动作与上报驱动的在线状态
//! - `desired`：期望值下发、重试循环与孪生查询
//!
//! 引擎以 [`TwinEngine`] 句柄显式传递，构造一次后克隆给各入口。

pub mod config;
mod desired;
mod dispatcher;
mod engine;
pub mod error;
pub mod handlers;
pub mod lifecycle;
mod spec_meta;

pub use config::EngineConfig;
pub use engine::{EngineDeps, TwinEngine};
pub use error::EngineError;
pub use lifecycle::DeviceAction;
pub use spec_meta::build_device_spec;
