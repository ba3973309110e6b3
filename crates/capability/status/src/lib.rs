//! # 设备状态管理
//!
//! 每台设备一条记录：状态快照 + 设备互斥锁 + 待重试期望值。
//! 所有改变生命周期的操作都必须先拿到 [`DeviceStatusGuard`]，
//! 状态写入接口只接受 guard，编译期保证"持锁才能改状态"。

mod error;
mod manager;

pub use error::StatusError;
pub use manager::{DeviceStatusGuard, DeviceStatusManager, StatusChange};
