//! 下发给 mapper 的设备规格（扁平 DTO，不含反向引用）。

use crate::status::DeviceState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSpecMeta {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(rename = "catagory", default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(rename = "id_code", default, skip_serializing_if = "String::is_empty")]
    pub identification_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<DeviceServiceSpec>,
}

impl DeviceSpecMeta {
    /// 仅携带设备 ID 的规格（start/stop/delete 使用）。
    pub fn id_only(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceServiceSpec {
    pub name: String,
    #[serde(rename = "props", default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<DevicePropertySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<DeviceEventSpec>,
    #[serde(rename = "cmds", default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<DeviceCommandSpec>,
}

impl DeviceServiceSpec {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.events.is_empty() && self.commands.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DevicePropertySpec {
    #[serde(rename = "pn")]
    pub name: String,
    #[serde(rename = "rw", default)]
    pub writable: bool,
    #[serde(rename = "max", default)]
    pub max_value: f64,
    #[serde(rename = "min", default)]
    pub min_value: f64,
    #[serde(rename = "un", default)]
    pub unit: String,
    #[serde(rename = "dt", default)]
    pub data_type: String,
    #[serde(rename = "ac", default, skip_serializing_if = "String::is_empty")]
    pub access_config: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceEventSpec {
    #[serde(rename = "en")]
    pub name: String,
    #[serde(rename = "et", default, skip_serializing_if = "String::is_empty")]
    pub event_type: String,
    #[serde(rename = "ac", default, skip_serializing_if = "String::is_empty")]
    pub access_config: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceCommandSpec {
    #[serde(rename = "cn")]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub req_param: BTreeMap<String, String>,
    #[serde(rename = "ac", default, skip_serializing_if = "String::is_empty")]
    pub access_config: String,
}
