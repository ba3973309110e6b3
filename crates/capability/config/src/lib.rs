//! 应用运行配置加载（`TWIN_` 前缀环境变量）。

use std::env;

/// 工作池下限，低于该值回落到默认值。
pub const MIN_WORKER_POOL_SIZE: usize = 512;
pub const DEFAULT_WORKER_POOL_SIZE: usize = 1024;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub http_enabled: bool,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub edge_online_ttl_seconds: u64,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    pub mqtt_qos: u8,
    pub mqtt_keep_alive_seconds: u64,
    pub mqtt_server_topic_prefix: String,
    pub mqtt_edge_topic_prefix: String,
    pub mqtt_queue_size: usize,
    pub worker_pool_size: usize,
    pub rpc_timeout_ms: u64,
    pub desired_lifetime_ms: i64,
    pub history_capacity: usize,
    pub retry_interval_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr =
            env::var("TWIN_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let http_enabled = read_bool_with_default("TWIN_HTTP_ENABLED", true);
        let database_url = read_optional("TWIN_DATABASE_URL");
        let redis_url = read_optional("TWIN_REDIS_URL");
        let edge_online_ttl_seconds = read_u64_with_default("TWIN_EDGE_ONLINE_TTL_SECONDS", 60)?;
        let mqtt_host = env::var("TWIN_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("TWIN_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("TWIN_MQTT_USERNAME");
        let mqtt_password = read_optional("TWIN_MQTT_PASSWORD");
        let mqtt_client_id = read_optional("TWIN_MQTT_CLIENT_ID")
            .unwrap_or_else(|| format!("twin-server-{}", uuid::Uuid::new_v4().simple()));
        let mqtt_qos = read_u8_with_default("TWIN_MQTT_QOS", 1)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "TWIN_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let mqtt_keep_alive_seconds = read_u64_with_default("TWIN_MQTT_KEEP_ALIVE_SECONDS", 30)?;
        let mqtt_server_topic_prefix = env::var("TWIN_MQTT_SERVER_TOPIC_PREFIX")
            .unwrap_or_else(|_| "adv/ithings/server".to_string());
        let mqtt_edge_topic_prefix = env::var("TWIN_MQTT_EDGE_TOPIC_PREFIX")
            .unwrap_or_else(|_| "adv/ithings/edge".to_string());
        let mqtt_queue_size = read_usize_with_default("TWIN_MQTT_QUEUE_SIZE", 4096)?.max(1);
        let worker_pool_size = sanitize_pool_size(read_usize_with_default(
            "TWIN_WORKER_POOL_SIZE",
            DEFAULT_WORKER_POOL_SIZE,
        )?);
        let rpc_timeout_ms = read_u64_with_default("TWIN_RPC_TIMEOUT_MS", 5_000)?;
        let desired_lifetime_ms = read_i64_with_default("TWIN_DESIRED_LIFETIME_MS", 30_000)?;
        let history_capacity = read_usize_with_default("TWIN_HISTORY_CAPACITY", 20)?.max(1);
        let retry_interval_ms = read_u64_with_default("TWIN_RETRY_INTERVAL_MS", 300)?.max(1);

        Ok(Self {
            http_addr,
            http_enabled,
            database_url,
            redis_url,
            edge_online_ttl_seconds,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_client_id,
            mqtt_qos,
            mqtt_keep_alive_seconds,
            mqtt_server_topic_prefix,
            mqtt_edge_topic_prefix,
            mqtt_queue_size,
            worker_pool_size,
            rpc_timeout_ms,
            desired_lifetime_ms,
            history_capacity,
            retry_interval_ms,
        })
    }
}

/// 池大小低于下限时使用默认值。
pub fn sanitize_pool_size(size: usize) -> usize {
    if size < MIN_WORKER_POOL_SIZE {
        DEFAULT_WORKER_POOL_SIZE
    } else {
        size
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_i64_with_default(key: &str, default: i64) -> Result<i64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<i64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
