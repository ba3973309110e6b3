//! 时序库与数据转发的内存实现，记录写入内容供测试断言。

use crate::error::StorageError;
use crate::models::ForwardKind;
use crate::traits::{DataForwarder, TimeSeriesStore};
use domain::{DeviceEvent, TwinProperty};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedRecord {
    pub device_id: String,
    pub edge_id: String,
    pub kind: ForwardKind,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub struct InMemorySink {
    twins: RwLock<Vec<(String, Vec<TwinProperty>)>>,
    events: RwLock<Vec<DeviceEvent>>,
    forwarded: RwLock<Vec<ForwardedRecord>>,
    fail_twin_writes: AtomicBool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored_twins(&self) -> Vec<(String, Vec<TwinProperty>)> {
        self.twins.read().map(|items| items.clone()).unwrap_or_default()
    }

    pub fn stored_events(&self) -> Vec<DeviceEvent> {
        self.events.read().map(|items| items.clone()).unwrap_or_default()
    }

    pub fn forwarded(&self) -> Vec<ForwardedRecord> {
        self.forwarded
            .read()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    pub fn fail_twin_writes(&self, fail: bool) {
        self.fail_twin_writes.store(fail, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl TimeSeriesStore for InMemorySink {
    async fn store_twins(
        &self,
        device_id: &str,
        twins: &[TwinProperty],
    ) -> Result<(), StorageError> {
        if self.fail_twin_writes.load(Ordering::Relaxed) {
            return Err(StorageError::new("time series write rejected"));
        }
        let mut items = self.twins.write().map_err(|_| StorageError::Lock)?;
        items.push((device_id.to_string(), twins.to_vec()));
        Ok(())
    }

    async fn store_event(&self, event: &DeviceEvent) -> Result<(), StorageError> {
        let mut items = self.events.write().map_err(|_| StorageError::Lock)?;
        items.push(event.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl DataForwarder for InMemorySink {
    async fn forward(
        &self,
        device_id: &str,
        edge_id: &str,
        kind: ForwardKind,
        payload: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let mut items = self.forwarded.write().map_err(|_| StorageError::Lock)?;
        items.push(ForwardedRecord {
            device_id: device_id.to_string(),
            edge_id: edge_id.to_string(),
            kind,
            payload: payload.clone(),
        });
        Ok(())
    }
}
