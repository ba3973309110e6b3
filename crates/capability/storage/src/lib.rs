//! # Twin Storage 模块
//!
//! 设备孪生核心的外部数据抽象层：
//!
//! - [`traits`]：`DeviceStore` / `TimeSeriesStore` / `DataForwarder` 接口
//! - [`online`]：`EdgePresence` 接口（edge 是否在线）
//! - [`models`]：设备实例、服务实例、设备模型、协议类型记录
//! - [`error`]：存储错误类型
//! - [`connection`]：PostgreSQL 连接池
//!
//! ## 存储实现
//!
//! - [`in_memory`]：`RwLock<HashMap>` 内存实现，用于测试和本地演示
//! - [`postgres`]：sqlx 参数化查询实现，生产环境使用
//! - [`redis`]：edge 在线状态的 Redis 实现（TTL 键）
//!
//! 核心只通过 trait 对象访问存储，不感知具体后端。

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod online;
pub mod postgres;
pub mod redis;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use online::*;
pub use crate::redis::RedisEdgePresence;
pub use traits::*;

pub use in_memory::{ForwardedRecord, InMemoryDeviceStore, InMemoryEdgePresence, InMemorySink};
pub use postgres::PgDeviceStore;
