use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::spec_meta::build_device_spec;
use api_contract::{Message, Response};
use domain::{DeviceSpecMeta, DeviceState, DeviceStatus, DeviceStatusDetails};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use twin_correlation::ListenerRegistry;
use twin_shadow::TwinStore;
use twin_status::DeviceStatusManager;
use twin_storage::{
    DataForwarder, DeviceInstanceRecord, DeviceStore, EdgePresence, TimeSeriesStore,
};
use twin_telemetry::record_reply_sent;
use twin_transport::Transport;

/// 引擎的外部协作方。
#[derive(Clone)]
pub struct EngineDeps {
    pub transport: Arc<dyn Transport>,
    pub devices: Arc<dyn DeviceStore>,
    pub presence: Arc<dyn EdgePresence>,
    pub time_series: Arc<dyn TimeSeriesStore>,
    pub forwarder: Arc<dyn DataForwarder>,
}

pub(crate) struct Inner {
    pub(crate) config: EngineConfig,
    pub(crate) deps: EngineDeps,
    pub(crate) listeners: ListenerRegistry<Response>,
    pub(crate) status: DeviceStatusManager,
    pub(crate) twins: TwinStore,
    pub(crate) pool: Arc<Semaphore>,
    pub(crate) ready: AtomicBool,
}

/// 孪生同步引擎句柄。构造一次，克隆后传给各入口（MQTT 驱动、HTTP 路由）。
#[derive(Clone)]
pub struct TwinEngine {
    pub(crate) inner: Arc<Inner>,
}

impl TwinEngine {
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Self {
        let config = config.sanitized();
        let status = DeviceStatusManager::new(deps.devices.clone());
        let twins = TwinStore::new(config.history_capacity);
        let pool = Arc::new(Semaphore::new(config.worker_pool_size));
        Self {
            inner: Arc::new(Inner {
                config,
                deps,
                listeners: ListenerRegistry::new(),
                status,
                twins,
                pool,
                ready: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn status(&self) -> &DeviceStatusManager {
        &self.inner.status
    }

    pub fn twins(&self) -> &TwinStore {
        &self.inner.twins
    }

    /// 驱动循环运行期间为 true。
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_ready(&self) -> Result<(), EngineError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(EngineError::CoreNotReady)
        }
    }

    pub(crate) async fn ensure_edge_online(&self, edge_id: &str) -> Result<(), EngineError> {
        if edge_id.is_empty() || !self.inner.deps.presence.is_online(edge_id).await? {
            return Err(EngineError::EdgeNotOnline(edge_id.to_string()));
        }
        Ok(())
    }

    /// 设备期望值有效期。
    ///
    /// 0 是合法取值，表示期望值立即过期；只有负值（记录未设置）才回落到全局默认值。
    pub(crate) fn desired_lifetime(&self, details: &DeviceStatusDetails) -> i64 {
        if details.life_time_of_desired_value >= 0 {
            details.life_time_of_desired_value
        } else {
            self.inner.config.desired_lifetime_ms
        }
    }

    pub(crate) async fn send_reply(&self, response: Response) {
        let pid = response.parent_id().to_string();
        let code = response.code().clone();
        match self.inner.deps.transport.send(Message::Response(response)).await {
            Ok(()) => {
                record_reply_sent();
                tracing::debug!(target: "twin.engine", pid = %pid, code = %code, "reply_sent");
            }
            Err(err) => {
                tracing::warn!(
                    target: "twin.engine",
                    pid = %pid,
                    code = %code,
                    error = %err,
                    "reply_send_failed"
                );
            }
        }
    }

    /// 组装单台设备的完整规格。
    pub(crate) async fn device_spec(
        &self,
        device: &DeviceInstanceRecord,
        state: DeviceState,
    ) -> Result<DeviceSpecMeta, EngineError> {
        let devices = &self.inner.deps.devices;
        let model = devices
            .find_device_model(&device.device_model_id)
            .await?
            .ok_or_else(|| EngineError::NoSuchDeviceModel(device.device_model_id.clone()))?;
        let services = devices.list_service_instances(&device.device_id).await?;
        build_device_spec(device, &services, &model, state)
            .ok_or_else(|| EngineError::NoSuchDevice(device.device_id.clone()))
    }

    /// edge 上某协议类型的全部可下发规格（跳过未激活、无模型或无服务配置的设备）。
    pub async fn device_spec_list(
        &self,
        edge_id: &str,
        protocol_type: &str,
    ) -> Result<Vec<DeviceSpecMeta>, EngineError> {
        self.ensure_edge_online(edge_id).await?;
        let devices = self
            .inner
            .deps
            .devices
            .list_devices_in_edge(edge_id, protocol_type)
            .await?;
        let mut specs = Vec::with_capacity(devices.len());
        for device in devices {
            if device.status == DeviceStatus::Inactive {
                continue;
            }
            match self.device_spec(&device, device.state).await {
                Ok(spec) => specs.push(spec),
                Err(EngineError::Storage(err)) => return Err(EngineError::Storage(err)),
                Err(err) => {
                    tracing::warn!(
                        target: "twin.engine",
                        edge_id = %edge_id,
                        device_id = %device.device_id,
                        error = %err,
                        "device_spec_skipped"
                    );
                }
            }
        }
        Ok(specs)
    }
}
