//! # PostgreSQL 存储实现模块
//!
//! 生产环境使用的 DeviceStore 实现。
//!
//! ## 数据库模式要求
//!
//! - `device_instances`：设备实例（device_id, name, edge_id, protocol_type, protocol, os,
//!   category, id_code, tags, device_model_id, life_time_of_desired_value, device_status,
//!   state, update_ts）
//! - `service_instances`：服务实例（id, device_id, name）
//! - `property_instances` / `event_instances` / `command_instances`：
//!   实例访问配置（service_id, name, access_config）
//! - `device_models`：设备模型（model_id, name）
//! - `service_models`：服务模型（id, model_id, name）
//! - `property_models`（service_model_id, name, writable, max_value, min_value, unit, data_type）
//! - `event_models`（service_model_id, name, event_type）
//! - `command_models`（service_model_id, name, request_param）
//! - `protocol_types`：协议类型（protocol_type 唯一, spec）
//! - `alert_logs`：告警记录（device_id, status）
//!
//! 状态与启停状态以小写文本存储，时间戳为毫秒整数。
//! 删除设备在一个事务内级联删除服务实例与其下的属性/事件/命令实例。

pub mod device;

pub use device::*;
