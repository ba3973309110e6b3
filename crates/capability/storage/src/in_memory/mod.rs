//! 内存存储实现模块
//!
//! 用于本地演示和测试：
//! - DeviceStore: InMemoryDeviceStore
//! - EdgePresence: InMemoryEdgePresence
//! - TimeSeriesStore / DataForwarder: InMemorySink

pub mod device;
pub mod presence;
pub mod sink;

pub use device::*;
pub use presence::*;
pub use sink::*;
