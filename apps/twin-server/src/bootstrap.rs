//! 运行时装配
//!
//! 按配置选择存储后端，建立 MQTT 连接并构造引擎：
//! - 配置了 TWIN_DATABASE_URL 时使用 Postgres，否则使用内存存储
//! - 配置了 TWIN_REDIS_URL 时 edge 在线状态读写 Redis，否则使用内存实现
//! - 时序库与数据转发由外部连接器承担，这里接空实现

use api_contract::TopicScheme;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use twin_config::AppConfig;
use twin_engine::{EngineConfig, EngineDeps, TwinEngine};
use twin_storage::{
    DataForwarder, DeviceStore, EdgePresence, InMemoryDeviceStore, InMemoryEdgePresence,
    NoopSink, PgDeviceStore, RedisEdgePresence, TimeSeriesStore, connect_pool,
};
use twin_transport::{BackoffPolicy, MqttTransport, MqttTransportConfig, retry_with_backoff};

pub async fn build_engine(
    config: &AppConfig,
    cancel: CancellationToken,
) -> Result<(TwinEngine, JoinHandle<()>), Box<dyn std::error::Error>> {
    let policy = BackoffPolicy::default();

    let devices: Arc<dyn DeviceStore> = match &config.database_url {
        Some(url) => {
            let pool = retry_with_backoff(&policy, &cancel, "postgres", || connect_pool(url)).await?;
            info!(target: "twin.server", "device_store_postgres");
            Arc::new(PgDeviceStore::new(pool))
        }
        None => {
            warn!(target: "twin.server", "device_store_in_memory");
            Arc::new(InMemoryDeviceStore::new())
        }
    };

    let presence: Arc<dyn EdgePresence> = match &config.redis_url {
        Some(url) => {
            info!(target: "twin.server", ttl_seconds = config.edge_online_ttl_seconds, "edge_presence_redis");
            Arc::new(RedisEdgePresence::connect(url, config.edge_online_ttl_seconds)?)
        }
        None => {
            warn!(target: "twin.server", "edge_presence_in_memory");
            Arc::new(InMemoryEdgePresence::new())
        }
    };

    let sink = Arc::new(NoopSink);
    let time_series: Arc<dyn TimeSeriesStore> = sink.clone();
    let forwarder: Arc<dyn DataForwarder> = sink;

    let (transport, mqtt_task) =
        MqttTransport::connect(mqtt_config(config), &policy, cancel).await?;

    let engine = TwinEngine::new(
        engine_config(config),
        EngineDeps {
            transport: Arc::new(transport),
            devices,
            presence,
            time_series,
            forwarder,
        },
    );
    Ok((engine, mqtt_task))
}

fn mqtt_config(config: &AppConfig) -> MqttTransportConfig {
    MqttTransportConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        client_id: config.mqtt_client_id.clone(),
        qos: config.mqtt_qos,
        keep_alive_seconds: config.mqtt_keep_alive_seconds,
        queue_size: config.mqtt_queue_size,
        topics: TopicScheme::new(
            config.mqtt_server_topic_prefix.clone(),
            config.mqtt_edge_topic_prefix.clone(),
        ),
    }
}

fn engine_config(config: &AppConfig) -> EngineConfig {
    EngineConfig {
        worker_pool_size: config.worker_pool_size,
        rpc_timeout: Duration::from_millis(config.rpc_timeout_ms),
        desired_lifetime_ms: config.desired_lifetime_ms,
        history_capacity: config.history_capacity,
        retry_interval: Duration::from_millis(config.retry_interval_ms),
    }
}
