//! 设备孪生领域模型：设备状态、孪生属性、下发规格与上报报文。
pub mod report;
pub mod spec;
pub mod status;
pub mod twin;

pub use report::{
    DeviceDataReport, DeviceEvent, DeviceStatusReport, DevicesDataReport, DevicesStatusReport,
    ProtocolRegistration,
};
pub use spec::{
    DeviceCommandSpec, DeviceEventSpec, DevicePropertySpec, DeviceServiceSpec, DeviceSpecMeta,
};
pub use status::{DeviceState, DeviceStatus, DeviceStatusDetails, UnknownValue};
pub use twin::{DesiredTwinsUpdate, DeviceTwin, DeviceTwinMessage, TwinProperty, TwinsData};

/// 当前毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
