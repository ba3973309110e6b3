//! 设备生命周期：管理端动作（create/start/stop/update/delete）与上报驱动的在线状态。
//!
//! 所有会改变设备状态的操作都在设备互斥锁内完成；删除通知等旁路动作放到后台任务。

use crate::engine::TwinEngine;
use crate::error::EngineError;
use api_contract::{Operation, Request};
use domain::{DeviceSpecMeta, DeviceState, DeviceStatus, DevicesStatusReport};
use std::str::FromStr;
use tracing::{debug, info, warn};
use twin_status::StatusChange;

/// 管理端设备动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    Create,
    Start,
    Stop,
    Update,
    Delete,
}

impl DeviceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAction::Create => "create",
            DeviceAction::Start => "start",
            DeviceAction::Stop => "stop",
            DeviceAction::Update => "update",
            DeviceAction::Delete => "delete",
        }
    }
}

impl FromStr for DeviceAction {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(DeviceAction::Create),
            "start" => Ok(DeviceAction::Start),
            "stop" => Ok(DeviceAction::Stop),
            "update" => Ok(DeviceAction::Update),
            "delete" => Ok(DeviceAction::Delete),
            other => Err(EngineError::InvalidParameters(format!(
                "unknown device action: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TwinEngine {
    /// 执行设备动作。
    ///
    /// 前置条件不满足时返回对应错误；create 对已激活设备、start/stop 对已处于目标状态的设备为空操作。
    pub async fn do_device_action(
        &self,
        device_id: &str,
        action: DeviceAction,
    ) -> Result<(), EngineError> {
        self.ensure_ready()?;
        if device_id.is_empty() {
            return Err(EngineError::InvalidParameters("device_id is empty".to_string()));
        }
        info!(
            target: "twin.engine",
            device_id = %device_id,
            action = %action,
            "device_action_requested"
        );

        let status = &self.inner.status;
        let guard = status.lock(device_id).await;
        let details = status
            .get_locked(&guard)
            .await?
            .ok_or_else(|| EngineError::NoSuchDevice(device_id.to_string()))?;

        match action {
            DeviceAction::Create => {
                if !details.is_inactive() {
                    return Ok(());
                }
                self.ensure_edge_online(&details.edge_id).await?;
                let record = self.find_record(device_id).await?;
                let spec = self.device_spec(&record, DeviceState::Started).await?;
                let request = Request::new(
                    &details.edge_id,
                    &details.protocol_type,
                    Operation::LifeControl,
                    DeviceAction::Create.as_str(),
                )
                .with_json(&spec)?;
                self.call_edge(request).await?;
                status
                    .update(
                        &guard,
                        StatusChange::both(DeviceStatus::Active, DeviceState::Started),
                    )
                    .await?;
            }
            DeviceAction::Start | DeviceAction::Stop => {
                if details.is_inactive() || details.is_offline() {
                    return Err(EngineError::DeviceOffline(device_id.to_string()));
                }
                let target = if action == DeviceAction::Start {
                    DeviceState::Started
                } else {
                    DeviceState::Stopped
                };
                if details.state == target {
                    return Ok(());
                }
                self.ensure_edge_online(&details.edge_id).await?;
                let request = Request::new(
                    &details.edge_id,
                    &details.protocol_type,
                    Operation::LifeControl,
                    action.as_str(),
                )
                .with_json(&DeviceSpecMeta::id_only(device_id))?;
                self.call_edge(request).await?;
                status.update(&guard, StatusChange::state(target)).await?;
            }
            DeviceAction::Update => {
                if details.is_inactive() || details.is_offline() {
                    return Err(EngineError::DeviceOffline(device_id.to_string()));
                }
                self.ensure_edge_online(&details.edge_id).await?;
                let record = self.find_record(device_id).await?;
                let spec = self.device_spec(&record, details.state).await?;
                let request = Request::new(
                    &details.edge_id,
                    &details.protocol_type,
                    Operation::LifeControl,
                    DeviceAction::Update.as_str(),
                )
                .with_json(&[spec])?;
                self.call_edge(request).await?;
                // 设备记录（有效期、标签等）可能被外部修改
                status.reload(&guard).await?;
            }
            DeviceAction::Delete => {
                status.delete(guard).await?;
                self.inner.twins.remove_device(device_id);
                self.spawn_delete_notification(
                    details.edge_id.clone(),
                    details.protocol_type.clone(),
                    device_id.to_string(),
                );
            }
        }

        info!(
            target: "twin.engine",
            device_id = %device_id,
            action = %action,
            "device_action_completed"
        );
        Ok(())
    }

    async fn find_record(
        &self,
        device_id: &str,
    ) -> Result<twin_storage::DeviceInstanceRecord, EngineError> {
        self.inner
            .deps
            .devices
            .find_device(device_id)
            .await?
            .ok_or_else(|| EngineError::NoSuchDevice(device_id.to_string()))
    }

    /// 后台通知 edge 删除设备，结果只记日志。
    pub(crate) fn spawn_delete_notification(
        &self,
        edge_id: String,
        mapper_id: String,
        device_id: String,
    ) {
        let engine = self.clone();
        tokio::spawn(async move {
            let request = match Request::new(
                &edge_id,
                &mapper_id,
                Operation::LifeControl,
                DeviceAction::Delete.as_str(),
            )
            .with_json(&DeviceSpecMeta::id_only(&device_id))
            {
                Ok(request) => request,
                Err(err) => {
                    warn!(
                        target: "twin.engine",
                        device_id = %device_id,
                        error = %err,
                        "delete_notification_encode_failed"
                    );
                    return;
                }
            };
            match engine.call_edge(request).await {
                Ok(_) => debug!(
                    target: "twin.engine",
                    edge_id = %edge_id,
                    device_id = %device_id,
                    "delete_notification_acknowledged"
                ),
                Err(err) => debug!(
                    target: "twin.engine",
                    edge_id = %edge_id,
                    device_id = %device_id,
                    error = %err,
                    "delete_notification_failed"
                ),
            }
        });
    }

    /// 处理 report/device_status。
    ///
    /// 每台设备独立加锁；单台设备的失败只记日志，不影响其余设备。
    pub(crate) async fn apply_status_report(
        &self,
        edge_id: &str,
        mapper_id: &str,
        report: DevicesStatusReport,
    ) {
        for item in report.devices {
            if let Err(err) = self
                .apply_device_status(edge_id, mapper_id, &item.device_id, &item.status)
                .await
            {
                warn!(
                    target: "twin.engine",
                    edge_id = %edge_id,
                    device_id = %item.device_id,
                    reported = %item.status,
                    error = %err,
                    "device_status_apply_failed"
                );
            }
        }
    }

    async fn apply_device_status(
        &self,
        edge_id: &str,
        mapper_id: &str,
        device_id: &str,
        reported: &str,
    ) -> Result<(), EngineError> {
        let status = &self.inner.status;
        let guard = status.lock(device_id).await;
        let Some(details) = status.get_locked(&guard).await? else {
            drop(guard);
            warn!(
                target: "twin.engine",
                edge_id = %edge_id,
                mapper_id = %mapper_id,
                device_id = %device_id,
                "unknown_device_reported"
            );
            self.spawn_delete_notification(
                edge_id.to_string(),
                mapper_id.to_string(),
                device_id.to_string(),
            );
            return Ok(());
        };

        match DeviceStatus::from_report(reported) {
            DeviceStatus::Online => {
                if details.is_online() {
                    return Ok(());
                }
                if details.is_offline() && !status.has_fetched(edge_id, &details.protocol_type) {
                    // 期间 mapper 未拉取规格，视为 edge 失联后恢复，整体重推一次；
                    // 同一 edge 的多台设备并发上报时只推一次
                    let _resync = status.lock_resync(edge_id, &details.protocol_type).await;
                    if !status.has_fetched(edge_id, &details.protocol_type) {
                        self.resync_edge_specs(edge_id, &details.protocol_type).await;
                    }
                }
                status
                    .update(&guard, StatusChange::status(DeviceStatus::Online))
                    .await?;
                drop(guard);

                let engine = self.clone();
                let device_id = device_id.to_string();
                tokio::spawn(async move {
                    engine.sync_desired_values(&device_id).await;
                });
            }
            _ => {
                let changed = status
                    .update(&guard, StatusChange::status(DeviceStatus::Offline))
                    .await?;
                if changed {
                    self.inner.deps.devices.invalidate_alerts(device_id).await?;
                }
            }
        }
        Ok(())
    }

    /// 向 edge 重推该协议类型的全部设备规格，成功后记录拉取历史。
    async fn resync_edge_specs(&self, edge_id: &str, protocol_type: &str) {
        let result = async {
            let specs = self.device_spec_list(edge_id, protocol_type).await?;
            let request = Request::new(
                edge_id,
                protocol_type,
                Operation::LifeControl,
                DeviceAction::Update.as_str(),
            )
            .with_json(&specs)?;
            self.call_edge(request).await?;
            Ok::<usize, EngineError>(specs.len())
        }
        .await;

        match result {
            Ok(count) => {
                self.inner
                    .status
                    .update_fetch_history(edge_id, protocol_type, true);
                info!(
                    target: "twin.engine",
                    edge_id = %edge_id,
                    protocol_type = %protocol_type,
                    devices = count,
                    "edge_specs_resynced"
                );
            }
            Err(err) => warn!(
                target: "twin.engine",
                edge_id = %edge_id,
                protocol_type = %protocol_type,
                error = %err,
                "edge_specs_resync_failed"
            ),
        }
    }

    /// edge 不可达：清除其全部协议类型的拉取历史，并把该 edge 下设备置为离线。
    pub async fn mark_edge_offline(&self, edge_id: &str) -> Result<u64, EngineError> {
        if edge_id.is_empty() {
            return Err(EngineError::InvalidParameters("edge_id is empty".to_string()));
        }
        let protocol_types = self
            .inner
            .deps
            .devices
            .list_protocol_types_in_edge(edge_id)
            .await?;
        for protocol_type in &protocol_types {
            self.inner
                .status
                .update_fetch_history(edge_id, protocol_type, false);
        }
        let affected = self
            .inner
            .status
            .update_all_in_edge(edge_id, DeviceStatus::Offline)
            .await?;
        info!(
            target: "twin.engine",
            edge_id = %edge_id,
            protocol_types = protocol_types.len(),
            devices = affected,
            "edge_marked_offline"
        );
        Ok(affected)
    }

    /// 记录 edge 在线状态；转为离线时同时执行 [`Self::mark_edge_offline`]。
    pub async fn set_edge_presence(&self, edge_id: &str, online: bool) -> Result<(), EngineError> {
        if edge_id.is_empty() {
            return Err(EngineError::InvalidParameters("edge_id is empty".to_string()));
        }
        self.inner
            .deps
            .presence
            .set_status(edge_id, online, domain::now_epoch_ms())
            .await?;
        if !online {
            self.mark_edge_offline(edge_id).await?;
        }
        Ok(())
    }
}
