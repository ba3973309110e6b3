//! 存储接口 Trait 定义
//!
//! - DeviceStore：设备实例 / 模型 / 协议类型 / 告警
//! - TimeSeriesStore：时序库写入（上报孪生与事件）
//! - DataForwarder：数据转发连接器
//!
//! 使用 async_trait 支持动态分发。

use crate::error::StorageError;
use crate::models::{
    DeviceInstanceRecord, DeviceModelRecord, DeviceStatusUpdate, ForwardKind, ProtocolTypeRecord,
    ServiceInstanceRecord,
};
use async_trait::async_trait;
use domain::{DeviceEvent, DeviceStatus, TwinProperty};

/// 设备持久化接口。
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find_device(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceInstanceRecord>, StorageError>;

    /// 列出 edge 上指定协议类型的设备。
    async fn list_devices_in_edge(
        &self,
        edge_id: &str,
        protocol_type: &str,
    ) -> Result<Vec<DeviceInstanceRecord>, StorageError>;

    async fn update_device_status(
        &self,
        device_id: &str,
        update: &DeviceStatusUpdate,
    ) -> Result<(), StorageError>;

    /// 单条语句批量更新 edge 下所有设备状态，返回影响行数。
    async fn update_all_status_in_edge(
        &self,
        edge_id: &str,
        status: DeviceStatus,
        update_ts_ms: i64,
    ) -> Result<u64, StorageError>;

    /// 删除设备及其服务/属性/事件/命令实例。
    async fn delete_device(&self, device_id: &str) -> Result<bool, StorageError>;

    async fn list_service_instances(
        &self,
        device_id: &str,
    ) -> Result<Vec<ServiceInstanceRecord>, StorageError>;

    async fn find_device_model(
        &self,
        model_id: &str,
    ) -> Result<Option<DeviceModelRecord>, StorageError>;

    async fn upsert_protocol_type(&self, record: ProtocolTypeRecord) -> Result<(), StorageError>;

    /// edge 上出现过的协议类型。
    async fn list_protocol_types_in_edge(&self, edge_id: &str)
    -> Result<Vec<String>, StorageError>;

    /// 设备离线后使其健康类告警失效。
    async fn invalidate_alerts(&self, device_id: &str) -> Result<(), StorageError>;
}

/// 时序库接口。
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn store_twins(
        &self,
        device_id: &str,
        twins: &[TwinProperty],
    ) -> Result<(), StorageError>;

    async fn store_event(&self, event: &DeviceEvent) -> Result<(), StorageError>;
}

/// 数据转发接口。
#[async_trait]
pub trait DataForwarder: Send + Sync {
    async fn forward(
        &self,
        device_id: &str,
        edge_id: &str,
        kind: ForwardKind,
        payload: &serde_json::Value,
    ) -> Result<(), StorageError>;
}

/// 空实现（未接入时序库/转发时占位）。
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl TimeSeriesStore for NoopSink {
    async fn store_twins(
        &self,
        _device_id: &str,
        _twins: &[TwinProperty],
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn store_event(&self, _event: &DeviceEvent) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl DataForwarder for NoopSink {
    async fn forward(
        &self,
        _device_id: &str,
        _edge_id: &str,
        _kind: ForwardKind,
        _payload: &serde_json::Value,
    ) -> Result<(), StorageError> {
        Ok(())
    }
}
