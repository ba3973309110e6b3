//! Handlers 模块

pub mod devices;
pub mod edges;
pub mod health;
pub mod twins;

pub use devices::*;
pub use edges::*;
pub use health::*;
pub use twins::*;
