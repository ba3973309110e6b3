//! 期望值下发、重试同步与孪生查询。

use crate::engine::TwinEngine;
use crate::error::EngineError;
use api_contract::{Operation, Request};
use domain::{DesiredTwinsUpdate, DeviceTwin, DeviceTwinMessage, TwinProperty, now_epoch_ms};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use twin_telemetry::{record_retry_attempt, record_retry_expired, record_retry_success};

const DESIRED_TWINS_RESOURCE: &str = "desired_twins";

impl TwinEngine {
    /// 合并期望值；设备在线时后台下发一次，失败的进入重试队列。
    ///
    /// 设备不在线时只写入缓存，待设备上线后统一同步。
    pub async fn update_desired_twins(
        &self,
        device_id: &str,
        properties: Vec<TwinProperty>,
    ) -> Result<(), EngineError> {
        self.ensure_ready()?;
        if device_id.is_empty() || properties.is_empty() {
            return Err(EngineError::InvalidParameters(
                "device_id and desired twins are required".to_string(),
            ));
        }
        let now_ms = now_epoch_ms();
        if let Some(property) = properties
            .iter()
            .find(|property| property.timestamp_ms < 0 || property.timestamp_ms > now_ms)
        {
            return Err(EngineError::InvalidParameters(format!(
                "invalid timestamp {} for {}/{}",
                property.timestamp_ms, property.service, property.property_name
            )));
        }
        let details = self
            .inner
            .status
            .get(device_id)
            .await?
            .ok_or_else(|| EngineError::NoSuchDevice(device_id.to_string()))?;

        self.inner.twins.merge_desired(device_id, properties.clone());
        if !details.is_online() {
            debug!(
                target: "twin.engine",
                device_id = %device_id,
                status = %details.status,
                "desired_twins_deferred"
            );
            return Ok(());
        }

        let engine = self.clone();
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = engine.send_desired_twins(&device_id, properties.clone()).await {
                warn!(
                    target: "twin.engine",
                    device_id = %device_id,
                    error = %err,
                    "desired_twins_push_failed"
                );
                if let Err(err) = engine.inner.status.merge_pending(&device_id, properties) {
                    warn!(
                        target: "twin.engine",
                        device_id = %device_id,
                        error = %err,
                        "desired_twins_pending_failed"
                    );
                }
            }
        });
        Ok(())
    }

    /// 同步下发 set_property/desired_twins，要求 edge 回复成功码。
    pub async fn send_desired_twins(
        &self,
        device_id: &str,
        properties: Vec<TwinProperty>,
    ) -> Result<(), EngineError> {
        let details = self
            .inner
            .status
            .get(device_id)
            .await?
            .ok_or_else(|| EngineError::NoSuchDevice(device_id.to_string()))?;
        let update = DesiredTwinsUpdate {
            device_id: device_id.to_string(),
            desired_twins: properties,
        };
        let request = Request::new(
            &details.edge_id,
            &details.protocol_type,
            Operation::SetProperty,
            DESIRED_TWINS_RESOURCE,
        )
        .with_json(&update)?;
        self.call_edge(request).await?;
        Ok(())
    }

    /// 当前仍在有效期内的期望值。
    pub async fn desired_twins(&self, device_id: &str) -> Result<Vec<TwinProperty>, EngineError> {
        let Some(details) = self.inner.status.get(device_id).await? else {
            return Ok(Vec::new());
        };
        let ttl = self.desired_lifetime(&details);
        Ok(self.inner.twins.desired_not_expired(device_id, ttl))
    }

    /// 设备上线后重推有效期内的全部期望值（先清空该设备的重试记录）。
    pub(crate) async fn sync_desired_values(&self, device_id: &str) {
        let desired = match self.desired_twins(device_id).await {
            Ok(desired) => desired,
            Err(err) => {
                warn!(
                    target: "twin.engine",
                    device_id = %device_id,
                    error = %err,
                    "desired_sync_load_failed"
                );
                return;
            }
        };
        if desired.is_empty() {
            return;
        }
        if let Err(err) = self.inner.status.clear_pending(device_id) {
            warn!(
                target: "twin.engine",
                device_id = %device_id,
                error = %err,
                "desired_sync_clear_failed"
            );
        }
        match self.send_desired_twins(device_id, desired.clone()).await {
            Ok(()) => info!(
                target: "twin.engine",
                device_id = %device_id,
                properties = desired.len(),
                "desired_twins_synced"
            ),
            Err(err) => warn!(
                target: "twin.engine",
                device_id = %device_id,
                error = %err,
                "desired_twins_sync_failed"
            ),
        }
    }

    /// 孪生查询：上报历史（最多环形缓冲容量条）逐条配上当前有效的期望值。
    pub async fn get_device_twin(&self, device_id: &str) -> Result<DeviceTwinMessage, EngineError> {
        if device_id.is_empty() {
            return Err(EngineError::InvalidParameters("device_id is empty".to_string()));
        }
        let desired = self.desired_twins(device_id).await?;
        let reported = self
            .inner
            .twins
            .recent_reported(device_id, self.inner.twins.capacity())
            .unwrap_or_default();
        let history = reported
            .into_iter()
            .map(|data| DeviceTwin {
                desired: desired.clone(),
                reported: data.twins,
            })
            .collect();
        Ok(DeviceTwinMessage {
            device_id: device_id.to_string(),
            history,
            desired_twins: Vec::new(),
        })
    }

    /// 重试循环：固定间隔扫描待重试设备，直到 cancel。
    pub(crate) async fn run_retry_loop(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.inner.config.retry_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.retry_pending_once() => {}
            }
        }
        debug!(target: "twin.engine", "retry_loop_stopped");
    }

    /// 扫描一轮；同一设备同一时刻最多一个下发在途。
    pub async fn retry_pending_once(&self) {
        let mut inflight = JoinSet::new();
        for (device_id, _) in self.inner.status.pending_devices() {
            let details = match self.inner.status.get(&device_id).await {
                Ok(Some(details)) => details,
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        target: "twin.engine",
                        device_id = %device_id,
                        error = %err,
                        "retry_status_load_failed"
                    );
                    continue;
                }
            };
            let ttl = self.desired_lifetime(&details);
            let remaining = match self
                .inner
                .status
                .prune_pending(&device_id, ttl, now_epoch_ms())
            {
                Ok(remaining) => remaining,
                Err(err) => {
                    warn!(
                        target: "twin.engine",
                        device_id = %device_id,
                        error = %err,
                        "retry_prune_failed"
                    );
                    continue;
                }
            };
            if remaining.is_empty() {
                record_retry_expired();
                debug!(target: "twin.engine", device_id = %device_id, "retry_entry_expired");
                continue;
            }

            record_retry_attempt();
            let engine = self.clone();
            inflight.spawn(async move {
                match engine.send_desired_twins(&device_id, remaining.clone()).await {
                    Ok(()) => {
                        record_retry_success();
                        if let Err(err) =
                            engine.inner.status.acknowledge_pending(&device_id, &remaining)
                        {
                            warn!(
                                target: "twin.engine",
                                device_id = %device_id,
                                error = %err,
                                "retry_ack_failed"
                            );
                        }
                    }
                    Err(err) => debug!(
                        target: "twin.engine",
                        device_id = %device_id,
                        error = %err,
                        "retry_push_failed"
                    ),
                }
            });
        }
        while inflight.join_next().await.is_some() {}
    }
}
