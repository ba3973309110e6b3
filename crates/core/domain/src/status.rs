use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 设备激活/在线状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Inactive,
    Active,
    Online,
    Offline,
}

/// 设备启停状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Started,
    Stopped,
}

/// 无法识别的状态字符串。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue(pub String);

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value: {}", self.0)
    }
}

impl std::error::Error for UnknownValue {}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Inactive => "inactive",
            DeviceStatus::Active => "active",
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
        }
    }

    /// 上报状态只区分 online，其余一律视为 offline。
    pub fn from_report(value: &str) -> Self {
        if value.eq_ignore_ascii_case("online") {
            DeviceStatus::Online
        } else {
            DeviceStatus::Offline
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inactive" => Ok(DeviceStatus::Inactive),
            "active" => Ok(DeviceStatus::Active),
            "online" => Ok(DeviceStatus::Online),
            "offline" => Ok(DeviceStatus::Offline),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Started => "started",
            DeviceState::Stopped => "stopped",
        }
    }
}

impl FromStr for DeviceState {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "started" => Ok(DeviceState::Started),
            "stopped" => Ok(DeviceState::Stopped),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 设备生命周期快照（缓存并镜像到持久层）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatusDetails {
    pub device_id: String,
    pub edge_id: String,
    pub protocol_type: String,
    pub update_ts_ms: i64,
    /// 期望值有效期（毫秒）。
    pub life_time_of_desired_value: i64,
    pub status: DeviceStatus,
    pub state: DeviceState,
}

impl DeviceStatusDetails {
    pub fn is_inactive(&self) -> bool {
        self.status == DeviceStatus::Inactive
    }

    pub fn is_offline(&self) -> bool {
        self.status == DeviceStatus::Offline
    }

    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }

    pub fn is_started(&self) -> bool {
        self.state == DeviceState::Started
    }
}
