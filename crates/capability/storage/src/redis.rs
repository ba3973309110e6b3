//! Redis edge 在线状态实现
//!
//! 在线状态写入带 TTL 的键，键过期即视为离线；
//! 显式离线写入不带 TTL 的 offline 记录。

use crate::error::StorageError;
use crate::online::EdgePresence;
use redis::AsyncCommands;

const STATUS_ONLINE: &str = "online";
const STATUS_OFFLINE: &str = "offline";

#[derive(serde::Serialize, serde::Deserialize)]
struct PresencePayload {
    status: String,
    ts_ms: i64,
}

fn edge_status_key(edge_id: &str) -> String {
    format!("edge:{}:status", edge_id)
}

pub struct RedisEdgePresence {
    client: redis::Client,
    ttl_seconds: u64,
}

impl RedisEdgePresence {
    pub fn connect(redis_url: &str, ttl_seconds: u64) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            ttl_seconds: ttl_seconds.max(1),
        })
    }
}

#[async_trait::async_trait]
impl EdgePresence for RedisEdgePresence {
    async fn is_online(&self, edge_id: &str) -> Result<bool, StorageError> {
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let data: Option<String> = connection.get(edge_status_key(edge_id)).await?;
        let Some(data) = data else {
            return Ok(false);
        };
        let payload: PresencePayload = serde_json::from_str(&data)?;
        Ok(payload.status == STATUS_ONLINE)
    }

    async fn set_status(
        &self,
        edge_id: &str,
        online: bool,
        ts_ms: i64,
    ) -> Result<(), StorageError> {
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let payload = PresencePayload {
            status: if online { STATUS_ONLINE } else { STATUS_OFFLINE }.to_string(),
            ts_ms,
        };
        let data = serde_json::to_string(&payload)?;
        let key = edge_status_key(edge_id);
        if online {
            connection
                .set_ex::<_, _, ()>(key, data, self.ttl_seconds)
                .await?;
        } else {
            connection.set::<_, _, ()>(key, data).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_key_is_scoped_by_edge() {
        assert_eq!(edge_status_key("edge-1"), "edge:edge-1:status");
    }

    #[test]
    fn payload_roundtrips_status() {
        let raw = r#"{"status":"online","ts_ms":12}"#;
        let payload: PresencePayload = serde_json::from_str(raw).expect("payload");
        assert_eq!(payload.status, STATUS_ONLINE);
        assert_eq!(payload.ts_ms, 12);
    }
}
