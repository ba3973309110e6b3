use serde::{Deserialize, Serialize};

/// 孪生属性：同一设备内以 (service, property_name) 唯一标识。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinProperty {
    #[serde(rename = "svc")]
    pub service: String,
    #[serde(rename = "pn")]
    pub property_name: String,
    #[serde(rename = "val", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(rename = "ts", default)]
    pub timestamp_ms: i64,
    #[serde(rename = "err_msg", default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl TwinProperty {
    pub fn new(
        service: impl Into<String>,
        property_name: impl Into<String>,
        value: serde_json::Value,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            service: service.into(),
            property_name: property_name.into(),
            value: Some(value),
            timestamp_ms,
            error_message: String::new(),
        }
    }

    pub fn same_key(&self, other: &TwinProperty) -> bool {
        self.service == other.service && self.property_name == other.property_name
    }

    /// 值为空或超过有效期即视为失效；ttl <= 0 永远失效，时间差溢出同样视为失效。
    pub fn is_fresh(&self, ttl_ms: i64, now_ms: i64) -> bool {
        if ttl_ms <= 0 {
            return false;
        }
        match &self.value {
            None | Some(serde_json::Value::Null) => false,
            Some(_) => now_ms
                .checked_sub(self.timestamp_ms)
                .is_some_and(|age| age <= ttl_ms),
        }
    }
}

/// 按 (service, property_name) 合并，后写覆盖。
pub fn merge_by_key(target: &mut Vec<TwinProperty>, incoming: impl IntoIterator<Item = TwinProperty>) {
    for property in incoming {
        match target.iter_mut().find(|existing| existing.same_key(&property)) {
            Some(existing) => *existing = property,
            None => target.push(property),
        }
    }
}

/// 过滤出未过期的属性。
pub fn fresh_properties(properties: &[TwinProperty], ttl_ms: i64, now_ms: i64) -> Vec<TwinProperty> {
    properties
        .iter()
        .filter(|property| property.is_fresh(ttl_ms, now_ms))
        .cloned()
        .collect()
}

/// 一次上报时刻采集到的属性集合。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinsData {
    pub ts: i64,
    pub twins: Vec<TwinProperty>,
}

/// 期望值与上报值配对。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceTwin {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub desired: Vec<TwinProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reported: Vec<TwinProperty>,
}

/// 孪生查询结果 / 期望值更新请求。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceTwinMessage {
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    #[serde(rename = "device_twins", default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<DeviceTwin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub desired_twins: Vec<TwinProperty>,
}

/// 下发给 mapper 的期望值更新内容（set_property/desired_twins）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredTwinsUpdate {
    pub device_id: String,
    pub desired_twins: Vec<TwinProperty>,
}
