//! edge 在线状态接口（由 agent 状态同步通道写入，核心只读判断）。

use crate::error::StorageError;
use async_trait::async_trait;

#[async_trait]
pub trait EdgePresence: Send + Sync {
    async fn is_online(&self, edge_id: &str) -> Result<bool, StorageError>;

    async fn set_status(&self, edge_id: &str, online: bool, ts_ms: i64)
    -> Result<(), StorageError>;
}
