//! edge 在线状态内存实现（用于测试与占位）。

use crate::error::StorageError;
use crate::online::EdgePresence;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Clone, Copy)]
struct Entry {
    online: bool,
    ts_ms: i64,
}

#[derive(Default)]
pub struct InMemoryEdgePresence {
    edges: RwLock<HashMap<String, Entry>>,
}

impl InMemoryEdgePresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置在线 edge。
    pub fn with_online(edge_ids: &[&str]) -> Self {
        let edges = edge_ids
            .iter()
            .map(|edge_id| {
                (
                    edge_id.to_string(),
                    Entry {
                        online: true,
                        ts_ms: 0,
                    },
                )
            })
            .collect();
        Self {
            edges: RwLock::new(edges),
        }
    }
}

impl InMemoryEdgePresence {
    /// 最近一次状态变更时间。
    pub fn last_change_ms(&self, edge_id: &str) -> Option<i64> {
        self.edges
            .read()
            .ok()
            .and_then(|map| map.get(edge_id).map(|entry| entry.ts_ms))
    }
}

#[async_trait::async_trait]
impl EdgePresence for InMemoryEdgePresence {
    async fn is_online(&self, edge_id: &str) -> Result<bool, StorageError> {
        let map = self.edges.read().map_err(|_| StorageError::Lock)?;
        Ok(map.get(edge_id).map(|entry| entry.online).unwrap_or(false))
    }

    async fn set_status(
        &self,
        edge_id: &str,
        online: bool,
        ts_ms: i64,
    ) -> Result<(), StorageError> {
        let mut map = self.edges.write().map_err(|_| StorageError::Lock)?;
        map.insert(edge_id.to_string(), Entry { online, ts_ms });
        Ok(())
    }
}
