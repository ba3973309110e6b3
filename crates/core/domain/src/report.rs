//! edge 上报与注册报文内容。

use crate::twin::TwinProperty;
use serde::{Deserialize, Serialize};

/// mapper 注册的协议类型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolRegistration {
    #[serde(rename = "type")]
    pub protocol_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec: String,
}

/// report/device_status 内容。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DevicesStatusReport {
    #[serde(alias = "devices_status", default)]
    pub devices: Vec<DeviceStatusReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatusReport {
    pub device_id: String,
    pub status: String,
}

/// report/device_data 内容。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DevicesDataReport {
    #[serde(default)]
    pub devices: Vec<DeviceDataReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDataReport {
    pub device_id: String,
    #[serde(alias = "twins", default)]
    pub services: Vec<TwinProperty>,
}

/// report/device_event 与 report/event_recover 内容。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device_id: String,
    #[serde(rename = "svc", default)]
    pub service: String,
    #[serde(rename = "en")]
    pub event_name: String,
    #[serde(rename = "ts", default)]
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}
