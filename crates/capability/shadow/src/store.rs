use dashmap::DashMap;
use domain::twin::{fresh_properties, merge_by_key};
use domain::{TwinProperty, TwinsData, now_epoch_ms};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

pub struct TwinStore {
    capacity: usize,
    reported: DashMap<String, VecDeque<TwinsData>>,
    desired: DashMap<String, Vec<TwinProperty>>,
}

impl Default for TwinStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TwinStore {
    /// 容量为 0 时按默认容量处理。
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_HISTORY_CAPACITY
        } else {
            capacity
        };
        Self {
            capacity,
            reported: DashMap::new(),
            desired: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 以当前时间记录一次上报。
    pub fn append_reported(&self, device_id: &str, twins: Vec<TwinProperty>) {
        self.append_reported_at(device_id, twins, now_epoch_ms());
    }

    pub fn append_reported_at(&self, device_id: &str, twins: Vec<TwinProperty>, ts: i64) {
        let mut ring = self
            .reported
            .entry(device_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(TwinsData { ts, twins });
    }

    /// 最近 count 条上报（旧在前）；无历史返回 None。
    pub fn recent_reported(&self, device_id: &str, count: usize) -> Option<Vec<TwinsData>> {
        let ring = self.reported.get(device_id)?;
        let take = count.min(ring.len());
        Some(ring.iter().skip(ring.len() - take).cloned().collect())
    }

    pub fn merge_desired(&self, device_id: &str, properties: Vec<TwinProperty>) {
        let mut desired = self.desired.entry(device_id.to_string()).or_default();
        merge_by_key(&mut desired, properties);
    }

    pub fn desired(&self, device_id: &str) -> Vec<TwinProperty> {
        self.desired
            .get(device_id)
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// 仍在有效期内的期望值；ttl <= 0 时为空。
    pub fn desired_not_expired(&self, device_id: &str, ttl_ms: i64) -> Vec<TwinProperty> {
        self.desired_not_expired_at(device_id, ttl_ms, now_epoch_ms())
    }

    pub fn desired_not_expired_at(
        &self,
        device_id: &str,
        ttl_ms: i64,
        now_ms: i64,
    ) -> Vec<TwinProperty> {
        if ttl_ms <= 0 {
            return Vec::new();
        }
        self.desired
            .get(device_id)
            .map(|items| fresh_properties(&items, ttl_ms, now_ms))
            .unwrap_or_default()
    }

    /// 设备删除后清理其孪生数据。
    pub fn remove_device(&self, device_id: &str) {
        self.reported.remove(device_id);
        self.desired.remove(device_id);
    }
}
