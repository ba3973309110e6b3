use crate::error::StatusError;
use dashmap::{DashMap, DashSet};
use domain::{DeviceState, DeviceStatus, DeviceStatusDetails, TwinProperty, now_epoch_ms};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;
use twin_storage::{DeviceStatusUpdate, DeviceStore};

#[derive(Default)]
struct DeviceEntry {
    lock: Arc<tokio::sync::Mutex<()>>,
    details: RwLock<Option<DeviceStatusDetails>>,
    /// 下发失败、等待重试的期望值。
    pending: Mutex<Vec<TwinProperty>>,
}

impl DeviceEntry {
    fn cached(&self) -> Result<Option<DeviceStatusDetails>, StatusError> {
        let details = self.details.read().map_err(|_| StatusError::Lock)?;
        Ok(details.clone())
    }

    fn store_cached(&self, value: DeviceStatusDetails) -> Result<(), StatusError> {
        let mut details = self.details.write().map_err(|_| StatusError::Lock)?;
        *details = Some(value);
        Ok(())
    }

    /// 既无状态快照也无待重试值，记录可以回收。锁中毒时保守地保留。
    fn is_vacant(&self) -> bool {
        let no_details = self.details.read().map(|item| item.is_none()).unwrap_or(false);
        let no_pending = self.pending.lock().map(|item| item.is_empty()).unwrap_or(false);
        no_details && no_pending
    }
}

type Entries = Arc<DashMap<String, Arc<DeviceEntry>>>;

/// 仍挂在表上且已空置时移除该记录。
fn release_if_vacant(devices: &Entries, device_id: &str, entry: &Arc<DeviceEntry>) {
    devices.remove_if(device_id, |_, current| {
        Arc::ptr_eq(current, entry) && current.is_vacant()
    });
}

/// 持有设备互斥锁的凭证。释放即解锁。
pub struct DeviceStatusGuard {
    device_id: String,
    entry: Arc<DeviceEntry>,
    devices: Entries,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for DeviceStatusGuard {
    // 未知设备加锁后不留下空记录；解锁前回收，等待者会在新记录上重新加锁
    fn drop(&mut self) {
        release_if_vacant(&self.devices, &self.device_id, &self.entry);
    }
}

impl DeviceStatusGuard {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl std::fmt::Debug for DeviceStatusGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStatusGuard")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// 状态变更：None 表示该字段保持不变。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusChange {
    pub status: Option<DeviceStatus>,
    pub state: Option<DeviceState>,
}

impl StatusChange {
    pub fn status(status: DeviceStatus) -> Self {
        Self {
            status: Some(status),
            state: None,
        }
    }

    pub fn state(state: DeviceState) -> Self {
        Self {
            status: None,
            state: Some(state),
        }
    }

    pub fn both(status: DeviceStatus, state: DeviceState) -> Self {
        Self {
            status: Some(status),
            state: Some(state),
        }
    }
}

/// 设备状态缓存，持久层为真实来源。
pub struct DeviceStatusManager {
    devices: Entries,
    /// 自 edge 上次不可达以来已拉取过规格的 (edge_id, protocol_type)。
    fetch_history: DashSet<(String, String)>,
    /// 规格重推按 (edge_id, protocol_type) 串行。
    resync_locks: DashMap<(String, String), Arc<tokio::sync::Mutex<()>>>,
    store: Arc<dyn DeviceStore>,
}

impl DeviceStatusManager {
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self {
            devices: Arc::new(DashMap::new()),
            fetch_history: DashSet::new(),
            resync_locks: DashMap::new(),
            store,
        }
    }

    fn entry(&self, device_id: &str) -> Arc<DeviceEntry> {
        if let Some(entry) = self.devices.get(device_id) {
            return Arc::clone(entry.value());
        }
        Arc::clone(
            self.devices
                .entry(device_id.to_string())
                .or_default()
                .value(),
        )
    }

    fn is_attached(&self, device_id: &str, entry: &Arc<DeviceEntry>) -> bool {
        self.devices
            .get(device_id)
            .map(|current| Arc::ptr_eq(current.value(), entry))
            .unwrap_or(false)
    }

    /// 获取设备互斥锁，锁不存在时创建。
    ///
    /// 等待期间设备被删除时，重新在新记录上加锁。
    pub async fn lock(&self, device_id: &str) -> DeviceStatusGuard {
        loop {
            let entry = self.entry(device_id);
            let guard = Arc::clone(&entry.lock).lock_owned().await;
            if self.is_attached(device_id, &entry) {
                return DeviceStatusGuard {
                    device_id: device_id.to_string(),
                    entry,
                    devices: Arc::clone(&self.devices),
                    _guard: guard,
                };
            }
        }
    }

    async fn load(
        &self,
        device_id: &str,
        entry: &DeviceEntry,
    ) -> Result<Option<DeviceStatusDetails>, StatusError> {
        if let Some(details) = entry.cached()? {
            return Ok(Some(details));
        }
        let Some(record) = self.store.find_device(device_id).await? else {
            return Ok(None);
        };
        let mut details = entry.details.write().map_err(|_| StatusError::Lock)?;
        // 并发读穿透时保留先写入者
        let value = details.get_or_insert_with(|| record.status_details()).clone();
        Ok(Some(value))
    }

    /// 读穿透查询，不持锁。未知设备返回 None，且不会留下缓存记录。
    pub async fn get(&self, device_id: &str) -> Result<Option<DeviceStatusDetails>, StatusError> {
        if let Some(entry) = self.devices.get(device_id).map(|item| Arc::clone(item.value())) {
            return self.load(device_id, &entry).await;
        }
        let Some(record) = self.store.find_device(device_id).await? else {
            return Ok(None);
        };
        let entry = self.entry(device_id);
        let mut details = entry.details.write().map_err(|_| StatusError::Lock)?;
        let value = details.get_or_insert_with(|| record.status_details()).clone();
        Ok(Some(value))
    }

    /// 持锁读取。
    pub async fn get_locked(
        &self,
        guard: &DeviceStatusGuard,
    ) -> Result<Option<DeviceStatusDetails>, StatusError> {
        self.load(&guard.device_id, &guard.entry).await
    }

    /// 丢弃缓存快照并从持久层重新加载（设备记录被外部修改后调用）。
    pub async fn reload(
        &self,
        guard: &DeviceStatusGuard,
    ) -> Result<Option<DeviceStatusDetails>, StatusError> {
        {
            let mut details = guard.entry.details.write().map_err(|_| StatusError::Lock)?;
            *details = None;
        }
        self.load(&guard.device_id, &guard.entry).await
    }

    /// 与缓存比对后写入。
    ///
    /// 无变化时不做任何 I/O，返回 false；持久化失败时缓存保持原值。
    pub async fn update(
        &self,
        guard: &DeviceStatusGuard,
        change: StatusChange,
    ) -> Result<bool, StatusError> {
        if !self.is_attached(&guard.device_id, &guard.entry) {
            return Err(StatusError::NoSuchDevice(guard.device_id.clone()));
        }
        let Some(current) = self.load(&guard.device_id, &guard.entry).await? else {
            return Err(StatusError::NoSuchDevice(guard.device_id.clone()));
        };
        let status = change.status.unwrap_or(current.status);
        let state = change.state.unwrap_or(current.state);
        if status == current.status && state == current.state {
            return Ok(false);
        }

        let update = DeviceStatusUpdate {
            status,
            state,
            update_ts_ms: now_epoch_ms(),
        };
        self.store
            .update_device_status(&guard.device_id, &update)
            .await?;
        guard.entry.store_cached(DeviceStatusDetails {
            status,
            state,
            update_ts_ms: update.update_ts_ms,
            ..current
        })?;
        tracing::debug!(
            target: "twin.status",
            device_id = %guard.device_id,
            from_status = %current.status,
            to_status = %status,
            from_state = %current.state,
            to_state = %state,
            "device_status_changed"
        );
        Ok(true)
    }

    /// 删除设备：确认存在后移除缓存记录与互斥锁，并在持久层级联删除。
    pub async fn delete(&self, guard: DeviceStatusGuard) -> Result<(), StatusError> {
        if self.load(&guard.device_id, &guard.entry).await?.is_none() {
            return Err(StatusError::NoSuchDevice(guard.device_id.clone()));
        }
        self.devices
            .remove_if(&guard.device_id, |_, entry| Arc::ptr_eq(entry, &guard.entry));
        self.store.delete_device(&guard.device_id).await?;
        tracing::info!(
            target: "twin.status",
            device_id = %guard.device_id,
            "device_status_removed"
        );
        Ok(())
    }

    /// edge 下所有缓存设备改为指定状态：一次批量持久化，再逐台加锁更新缓存。
    ///
    /// 调用方不得持有任何设备锁。
    pub async fn update_all_in_edge(
        &self,
        edge_id: &str,
        status: DeviceStatus,
    ) -> Result<u64, StatusError> {
        let update_ts_ms = now_epoch_ms();
        let affected = self
            .store
            .update_all_status_in_edge(edge_id, status, update_ts_ms)
            .await?;

        let entries: Vec<Arc<DeviceEntry>> = self
            .devices
            .iter()
            .map(|item| Arc::clone(item.value()))
            .collect();
        let mut updated = 0usize;
        for entry in entries {
            let _guard = entry.lock.lock().await;
            let mut details = entry.details.write().map_err(|_| StatusError::Lock)?;
            if let Some(details) = details.as_mut().filter(|item| item.edge_id == edge_id) {
                details.status = status;
                details.update_ts_ms = update_ts_ms;
                updated += 1;
            }
        }
        tracing::info!(
            target: "twin.status",
            edge_id = %edge_id,
            status = %status,
            persisted = affected,
            cached = updated,
            "edge_devices_status_updated"
        );
        Ok(affected)
    }

    pub fn update_fetch_history(&self, edge_id: &str, protocol_type: &str, fetched: bool) {
        let key = (edge_id.to_string(), protocol_type.to_string());
        if fetched {
            self.fetch_history.insert(key);
        } else {
            self.fetch_history.remove(&key);
        }
    }

    pub fn has_fetched(&self, edge_id: &str, protocol_type: &str) -> bool {
        self.fetch_history
            .contains(&(edge_id.to_string(), protocol_type.to_string()))
    }

    /// 获取 (edge_id, protocol_type) 的规格重推锁。
    ///
    /// 持锁后应重新检查 [`Self::has_fetched`]：等待期间其他任务可能已完成重推。
    pub async fn lock_resync(&self, edge_id: &str, protocol_type: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(
            self.resync_locks
                .entry((edge_id.to_string(), protocol_type.to_string()))
                .or_default()
                .value(),
        );
        lock.lock_owned().await
    }

    /// 当前缓存的设备记录数。
    pub fn cached_devices(&self) -> usize {
        self.devices.len()
    }

    /// 合并待重试期望值（按 service + property_name 覆盖）。
    pub fn merge_pending(
        &self,
        device_id: &str,
        properties: Vec<TwinProperty>,
    ) -> Result<(), StatusError> {
        // 持有分片引用期间写入，避免与空置回收交错
        let entry = self.devices.entry(device_id.to_string()).or_default();
        let mut pending = entry.value().pending.lock().map_err(|_| StatusError::Lock)?;
        domain::twin::merge_by_key(&mut pending, properties);
        Ok(())
    }

    /// 当前所有非空的待重试记录快照。
    pub fn pending_devices(&self) -> Vec<(String, Vec<TwinProperty>)> {
        self.devices
            .iter()
            .filter_map(|item| {
                let pending = item.value().pending.lock().ok()?;
                if pending.is_empty() {
                    return None;
                }
                Some((item.key().clone(), pending.clone()))
            })
            .collect()
    }

    pub fn pending(&self, device_id: &str) -> Vec<TwinProperty> {
        self.devices
            .get(device_id)
            .and_then(|entry| entry.pending.lock().ok().map(|items| items.clone()))
            .unwrap_or_default()
    }

    /// 剔除过期项，返回剩余项；全部过期时记录被清空。
    pub fn prune_pending(
        &self,
        device_id: &str,
        ttl_ms: i64,
        now_ms: i64,
    ) -> Result<Vec<TwinProperty>, StatusError> {
        let Some(entry) = self.devices.get(device_id).map(|item| Arc::clone(item.value())) else {
            return Ok(Vec::new());
        };
        let remaining = {
            let mut pending = entry.pending.lock().map_err(|_| StatusError::Lock)?;
            pending.retain(|property| property.is_fresh(ttl_ms, now_ms));
            pending.clone()
        };
        if remaining.is_empty() {
            release_if_vacant(&self.devices, device_id, &entry);
        }
        Ok(remaining)
    }

    /// 确认已送达的期望值：只移除与发送内容一致（key 与时间戳相同）的项，
    /// 发送期间新合并进来的值保留到下一轮。
    pub fn acknowledge_pending(
        &self,
        device_id: &str,
        sent: &[TwinProperty],
    ) -> Result<(), StatusError> {
        let Some(entry) = self.devices.get(device_id).map(|item| Arc::clone(item.value())) else {
            return Ok(());
        };
        {
            let mut pending = entry.pending.lock().map_err(|_| StatusError::Lock)?;
            pending.retain(|property| {
                !sent.iter().any(|item| {
                    item.same_key(property) && item.timestamp_ms == property.timestamp_ms
                })
            });
        }
        release_if_vacant(&self.devices, device_id, &entry);
        Ok(())
    }

    pub fn clear_pending(&self, device_id: &str) -> Result<(), StatusError> {
        if let Some(entry) = self.devices.get(device_id).map(|item| Arc::clone(item.value())) {
            entry.pending.lock().map_err(|_| StatusError::Lock)?.clear();
            release_if_vacant(&self.devices, device_id, &entry);
        }
        Ok(())
    }
}
