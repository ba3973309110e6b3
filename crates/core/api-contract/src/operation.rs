use crate::ContractError;
use domain::{DeviceEvent, DevicesDataReport, DevicesStatusReport, ProtocolRegistration};
use serde::de::DeserializeOwned;
use std::str::FromStr;

/// 请求操作。`reply` 不是请求操作，由 topic 层识别为回复。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Fetch,
    Report,
    LifeControl,
    SetProperty,
}

pub const REPLY_OPERATION: &str = "reply";

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::Fetch => "fetch",
            Operation::Report => "report",
            Operation::LifeControl => "life_control",
            Operation::SetProperty => "set_property",
        }
    }
}

impl FromStr for Operation {
    type Err = ContractError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "register" => Ok(Operation::Register),
            "fetch" => Ok(Operation::Fetch),
            "report" => Ok(Operation::Report),
            "life_control" => Ok(Operation::LifeControl),
            "set_property" => Ok(Operation::SetProperty),
            other => Err(ContractError::UnknownOperation(other.to_string())),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// report 操作的资源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportResource {
    DeviceStatus,
    DeviceData,
    DeviceEvent,
    EventRecover,
}

impl ReportResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportResource::DeviceStatus => "device_status",
            ReportResource::DeviceData => "device_data",
            ReportResource::DeviceEvent => "device_event",
            ReportResource::EventRecover => "event_recover",
        }
    }
}

impl FromStr for ReportResource {
    type Err = ContractError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "device_status" => Ok(ReportResource::DeviceStatus),
            "device_data" => Ok(ReportResource::DeviceData),
            "device_event" => Ok(ReportResource::DeviceEvent),
            "event_recover" => Ok(ReportResource::EventRecover),
            other => Err(ContractError::UnknownResource(other.to_string())),
        }
    }
}

/// 上报内容。
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    DeviceStatus(DevicesStatusReport),
    DeviceData(DevicesDataReport),
    DeviceEvent(DeviceEvent),
    EventRecover(DeviceEvent),
}

/// 解码后的 edge 请求。
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeRequest {
    Register(ProtocolRegistration),
    Fetch,
    Report(Report),
    /// 生命周期控制只由服务端下发，edge 发来时按拒绝处理。
    LifeControl { resource: String },
    SetProperty { resource: String },
}

impl EdgeRequest {
    pub fn decode(
        operation: Operation,
        resource: &str,
        content: &str,
    ) -> Result<Self, ContractError> {
        match operation {
            Operation::Register => Ok(EdgeRequest::Register(parse_content(content)?)),
            Operation::Fetch => Ok(EdgeRequest::Fetch),
            Operation::Report => {
                let report = match resource.parse::<ReportResource>()? {
                    ReportResource::DeviceStatus => Report::DeviceStatus(parse_content(content)?),
                    ReportResource::DeviceData => Report::DeviceData(parse_content(content)?),
                    ReportResource::DeviceEvent => Report::DeviceEvent(parse_content(content)?),
                    ReportResource::EventRecover => Report::EventRecover(parse_content(content)?),
                };
                Ok(EdgeRequest::Report(report))
            }
            Operation::LifeControl => Ok(EdgeRequest::LifeControl {
                resource: resource.to_string(),
            }),
            Operation::SetProperty => Ok(EdgeRequest::SetProperty {
                resource: resource.to_string(),
            }),
        }
    }
}

fn parse_content<T: DeserializeOwned>(content: &str) -> Result<T, ContractError> {
    serde_json::from_str(content).map_err(|err| ContractError::InvalidPayload(err.to_string()))
}
