//! 存储记录模型。
//!
//! 设备实例、服务实例、设备模型按 ID 分别查询，
//! 由上层组装为下发规格，记录之间不保存反向引用。

use domain::{DeviceState, DeviceStatus, DeviceStatusDetails};
use std::collections::BTreeMap;

/// 设备实例记录。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInstanceRecord {
    pub device_id: String,
    pub name: String,
    pub edge_id: String,
    pub protocol_type: String,
    /// 协议配置（JSON 文本）。
    pub protocol: String,
    pub os: String,
    pub category: String,
    pub identification_code: String,
    pub tags: BTreeMap<String, String>,
    pub device_model_id: String,
    /// 期望值有效期（毫秒）。
    pub life_time_of_desired_value: i64,
    pub status: DeviceStatus,
    pub state: DeviceState,
    pub update_ts_ms: i64,
}

impl DeviceInstanceRecord {
    pub fn status_details(&self) -> DeviceStatusDetails {
        DeviceStatusDetails {
            device_id: self.device_id.clone(),
            edge_id: self.edge_id.clone(),
            protocol_type: self.protocol_type.clone(),
            update_ts_ms: self.update_ts_ms,
            life_time_of_desired_value: self.life_time_of_desired_value,
            status: self.status,
            state: self.state,
        }
    }
}

/// 设备状态写入。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatusUpdate {
    pub status: DeviceStatus,
    pub state: DeviceState,
    pub update_ts_ms: i64,
}

/// 实例侧的访问配置（属性/事件/命令共用）。
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceAccess {
    pub name: String,
    pub access_config: String,
}

/// 服务实例记录。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceInstanceRecord {
    pub name: String,
    pub properties: Vec<InstanceAccess>,
    pub events: Vec<InstanceAccess>,
    pub commands: Vec<InstanceAccess>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyModelRecord {
    pub name: String,
    pub writable: bool,
    pub max_value: f64,
    pub min_value: f64,
    pub unit: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventModelRecord {
    pub name: String,
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandModelRecord {
    pub name: String,
    /// 请求参数（JSON 对象文本）。
    pub request_param: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceModelRecord {
    pub name: String,
    pub properties: Vec<PropertyModelRecord>,
    pub events: Vec<EventModelRecord>,
    pub commands: Vec<CommandModelRecord>,
}

/// 设备模型记录。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceModelRecord {
    pub model_id: String,
    pub name: String,
    pub services: Vec<ServiceModelRecord>,
}

impl DeviceModelRecord {
    pub fn service(&self, name: &str) -> Option<&ServiceModelRecord> {
        self.services.iter().find(|service| service.name == name)
    }
}

/// mapper 注册的协议类型记录。
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolTypeRecord {
    pub protocol_type: String,
    pub spec: String,
}

/// 数据转发的数据类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardKind {
    Property,
    Event,
}

impl ForwardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardKind::Property => "property",
            ForwardKind::Event => "event",
        }
    }
}
