#![allow(dead_code)]

use api_contract::{Message, ReplyCode, Request, Response};
use domain::{DeviceState, DeviceStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use twin_engine::{EngineConfig, EngineDeps, TwinEngine};
use twin_storage::{
    CommandModelRecord, DeviceInstanceRecord, DeviceModelRecord, EventModelRecord,
    InMemoryDeviceStore, InMemoryEdgePresence, InMemorySink, InstanceAccess, PropertyModelRecord,
    ServiceInstanceRecord, ServiceModelRecord,
};
use twin_transport::{ChannelTransport, Transport};

pub const EDGE: &str = "edge-1";
pub const PROTOCOL: &str = "modbus";
pub const MODEL: &str = "model-1";

pub fn device(device_id: &str, status: DeviceStatus, state: DeviceState) -> DeviceInstanceRecord {
    DeviceInstanceRecord {
        device_id: device_id.to_string(),
        name: device_id.to_string(),
        edge_id: EDGE.to_string(),
        protocol_type: PROTOCOL.to_string(),
        protocol: "{\"slave\":1}".to_string(),
        os: "linux".to_string(),
        category: "meter".to_string(),
        identification_code: String::new(),
        tags: BTreeMap::new(),
        device_model_id: MODEL.to_string(),
        life_time_of_desired_value: 30_000,
        status,
        state,
        update_ts_ms: 1,
    }
}

fn model() -> DeviceModelRecord {
    DeviceModelRecord {
        model_id: MODEL.to_string(),
        name: "meter".to_string(),
        services: vec![ServiceModelRecord {
            name: "energy".to_string(),
            properties: vec![PropertyModelRecord {
                name: "power".to_string(),
                writable: true,
                max_value: 100.0,
                min_value: 0.0,
                unit: "kW".to_string(),
                data_type: "float".to_string(),
            }],
            events: vec![EventModelRecord {
                name: "overload".to_string(),
                event_type: "alarm".to_string(),
            }],
            commands: vec![CommandModelRecord {
                name: "reset".to_string(),
                request_param: "{}".to_string(),
            }],
        }],
    }
}

fn services() -> Vec<ServiceInstanceRecord> {
    vec![ServiceInstanceRecord {
        name: "energy".to_string(),
        properties: vec![InstanceAccess {
            name: "power".to_string(),
            access_config: "{\"reg\":1}".to_string(),
        }],
        ..Default::default()
    }]
}

/// 测试用短超时与快速重试。
pub fn test_config() -> EngineConfig {
    EngineConfig {
        rpc_timeout: Duration::from_millis(300),
        retry_interval: Duration::from_millis(20),
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub engine: TwinEngine,
    /// edge 一侧的通道端点。
    pub edge: ChannelTransport,
    pub store: Arc<InMemoryDeviceStore>,
    pub presence: Arc<InMemoryEdgePresence>,
    pub sink: Arc<InMemorySink>,
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl Harness {
    /// 构造引擎但不启动分发循环。
    pub fn build(config: EngineConfig, devices: Vec<DeviceInstanceRecord>) -> Self {
        let store = Arc::new(InMemoryDeviceStore::new());
        store.insert_model(model()).expect("insert model");
        for record in devices {
            store
                .insert_services(&record.device_id, services())
                .expect("insert services");
            store.insert_device(record).expect("insert device");
        }
        let presence = Arc::new(InMemoryEdgePresence::with_online(&[EDGE]));
        let sink = Arc::new(InMemorySink::new());
        let (core, edge) = ChannelTransport::pair();
        let engine = TwinEngine::new(
            config,
            EngineDeps {
                transport: Arc::new(core),
                devices: store.clone(),
                presence: presence.clone(),
                time_series: sink.clone(),
                forwarder: sink.clone(),
            },
        );
        Self {
            engine,
            edge,
            store,
            presence,
            sink,
            cancel: CancellationToken::new(),
            driver: None,
        }
    }

    pub async fn start(devices: Vec<DeviceInstanceRecord>) -> Self {
        Self::start_with(test_config(), devices).await
    }

    pub async fn start_with(config: EngineConfig, devices: Vec<DeviceInstanceRecord>) -> Self {
        let mut harness = Self::build(config, devices);
        let engine = harness.engine.clone();
        let cancel = harness.cancel.clone();
        harness.driver = Some(tokio::spawn(async move { engine.run(cancel).await }));
        while !harness.engine.is_ready() {
            tokio::task::yield_now().await;
        }
        harness
    }

    pub async fn next_message(&self) -> Message {
        tokio::time::timeout(Duration::from_secs(2), self.edge.receive())
            .await
            .expect("message in time")
            .expect("transport open")
    }

    pub async fn next_request(&self) -> Request {
        match self.next_message().await {
            Message::Request(request) => request,
            other => panic!("expected request, got {other:?}"),
        }
    }

    pub async fn next_response(&self) -> Response {
        match self.next_message().await {
            Message::Response(response) => response,
            other => panic!("expected response, got {other:?}"),
        }
    }

    /// 以 edge 身份回复核心发来的请求。
    pub async fn reply(&self, request: &Request, code: ReplyCode) {
        self.edge
            .send(Message::Response(request.reply(code, "")))
            .await
            .expect("send reply");
    }

    /// 以 edge 身份发送请求并等待核心回复。
    pub async fn call(&self, request: Request) -> Response {
        self.edge
            .send(Message::Request(request))
            .await
            .expect("send request");
        self.next_response().await
    }

    pub async fn assert_quiet(&self, wait: Duration) {
        if let Ok(message) = tokio::time::timeout(wait, self.edge.receive()).await {
            panic!("unexpected message: {message:?}");
        }
    }

    pub async fn set_edge_online(&self, online: bool) {
        use twin_storage::EdgePresence;
        self.presence
            .set_status(EDGE, online, domain::now_epoch_ms())
            .await
            .expect("set presence");
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(driver) = self.driver.take() {
            driver.await.expect("driver exits");
        }
        assert!(!self.engine.is_ready());
    }
}

/// 轮询直到条件成立。
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
