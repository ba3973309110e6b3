//! 设备内存存储实现
//!
//! 使用 RwLock + HashMap 提供线程安全的内存存储，
//! 额外记录状态写入次数与告警失效记录，便于测试观察副作用。

use crate::error::StorageError;
use crate::models::{
    DeviceInstanceRecord, DeviceModelRecord, DeviceStatusUpdate, ProtocolTypeRecord,
    ServiceInstanceRecord,
};
use crate::traits::DeviceStore;
use domain::DeviceStatus;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, DeviceInstanceRecord>>,
    services: RwLock<HashMap<String, Vec<ServiceInstanceRecord>>>,
    models: RwLock<HashMap<String, DeviceModelRecord>>,
    protocols: RwLock<HashMap<String, ProtocolTypeRecord>>,
    invalidated_alerts: RwLock<Vec<String>>,
    status_writes: AtomicU64,
    fail_status_writes: AtomicBool,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_device(&self, record: DeviceInstanceRecord) -> Result<(), StorageError> {
        let mut map = self.devices.write().map_err(|_| StorageError::Lock)?;
        map.insert(record.device_id.clone(), record);
        Ok(())
    }

    pub fn insert_services(
        &self,
        device_id: &str,
        services: Vec<ServiceInstanceRecord>,
    ) -> Result<(), StorageError> {
        let mut map = self.services.write().map_err(|_| StorageError::Lock)?;
        map.insert(device_id.to_string(), services);
        Ok(())
    }

    pub fn insert_model(&self, record: DeviceModelRecord) -> Result<(), StorageError> {
        let mut map = self.models.write().map_err(|_| StorageError::Lock)?;
        map.insert(record.model_id.clone(), record);
        Ok(())
    }

    pub fn protocol_type(&self, protocol_type: &str) -> Option<ProtocolTypeRecord> {
        self.protocols
            .read()
            .ok()
            .and_then(|map| map.get(protocol_type).cloned())
    }

    /// 状态写入次数（单条与批量均计入）。
    pub fn status_writes(&self) -> u64 {
        self.status_writes.load(Ordering::Relaxed)
    }

    pub fn invalidated_alerts(&self) -> Vec<String> {
        self.invalidated_alerts
            .read()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// 让后续状态写入失败，用于验证写失败时缓存不被修改。
    pub fn fail_status_writes(&self, fail: bool) {
        self.fail_status_writes.store(fail, Ordering::Relaxed);
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_status_writes.load(Ordering::Relaxed) {
            return Err(StorageError::new("status write rejected"));
        }
        self.status_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn find_device(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceInstanceRecord>, StorageError> {
        let map = self.devices.read().map_err(|_| StorageError::Lock)?;
        Ok(map.get(device_id).cloned())
    }

    async fn list_devices_in_edge(
        &self,
        edge_id: &str,
        protocol_type: &str,
    ) -> Result<Vec<DeviceInstanceRecord>, StorageError> {
        let map = self.devices.read().map_err(|_| StorageError::Lock)?;
        let mut items: Vec<DeviceInstanceRecord> = map
            .values()
            .filter(|item| item.edge_id == edge_id && item.protocol_type == protocol_type)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }

    async fn update_device_status(
        &self,
        device_id: &str,
        update: &DeviceStatusUpdate,
    ) -> Result<(), StorageError> {
        self.check_write()?;
        let mut map = self.devices.write().map_err(|_| StorageError::Lock)?;
        if let Some(record) = map.get_mut(device_id) {
            record.status = update.status;
            record.state = update.state;
            record.update_ts_ms = update.update_ts_ms;
        }
        Ok(())
    }

    async fn update_all_status_in_edge(
        &self,
        edge_id: &str,
        status: DeviceStatus,
        update_ts_ms: i64,
    ) -> Result<u64, StorageError> {
        self.check_write()?;
        let mut map = self.devices.write().map_err(|_| StorageError::Lock)?;
        let mut affected = 0;
        for record in map.values_mut().filter(|item| item.edge_id == edge_id) {
            record.status = status;
            record.update_ts_ms = update_ts_ms;
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_device(&self, device_id: &str) -> Result<bool, StorageError> {
        let removed = self
            .devices
            .write()
            .map_err(|_| StorageError::Lock)?
            .remove(device_id)
            .is_some();
        self.services
            .write()
            .map_err(|_| StorageError::Lock)?
            .remove(device_id);
        Ok(removed)
    }

    async fn list_service_instances(
        &self,
        device_id: &str,
    ) -> Result<Vec<ServiceInstanceRecord>, StorageError> {
        let map = self.services.read().map_err(|_| StorageError::Lock)?;
        Ok(map.get(device_id).cloned().unwrap_or_default())
    }

    async fn find_device_model(
        &self,
        model_id: &str,
    ) -> Result<Option<DeviceModelRecord>, StorageError> {
        let map = self.models.read().map_err(|_| StorageError::Lock)?;
        Ok(map.get(model_id).cloned())
    }

    async fn upsert_protocol_type(&self, record: ProtocolTypeRecord) -> Result<(), StorageError> {
        let mut map = self.protocols.write().map_err(|_| StorageError::Lock)?;
        map.insert(record.protocol_type.clone(), record);
        Ok(())
    }

    async fn list_protocol_types_in_edge(
        &self,
        edge_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        let map = self.devices.read().map_err(|_| StorageError::Lock)?;
        let types: BTreeSet<String> = map
            .values()
            .filter(|item| item.edge_id == edge_id)
            .map(|item| item.protocol_type.clone())
            .collect();
        Ok(types.into_iter().collect())
    }

    async fn invalidate_alerts(&self, device_id: &str) -> Result<(), StorageError> {
        let mut items = self
            .invalidated_alerts
            .write()
            .map_err(|_| StorageError::Lock)?;
        items.push(device_id.to_string());
        Ok(())
    }
}
