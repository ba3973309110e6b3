//! # 孪生存储
//!
//! 按设备保存两类数据：
//! - 上报历史：固定容量的环形缓冲，满后覆盖最旧的一条
//! - 期望值：每台设备一份，按 (service, property_name) 合并
//!
//! 同一设备的写入经由 DashMap 分片锁串行化，读取返回快照副本。

mod store;

pub use store::{DEFAULT_HISTORY_CAPACITY, TwinStore};
