use crate::error::CorrelationError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// generation 区分同一 ID 的先后两次注册，避免旧监听器注销新注册。
struct Slot<T> {
    generation: u64,
    sender: oneshot::Sender<T>,
}

type Slots<T> = Arc<DashMap<String, Slot<T>>>;

/// ID → 单槽通道的并发映射。
pub struct ListenerRegistry<T> {
    slots: Slots<T>,
    generation: Arc<AtomicU64>,
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// 一次等待中的调用。丢弃即注销。
pub struct Listener<T> {
    id: String,
    generation: u64,
    timeout: Duration,
    receiver: oneshot::Receiver<T>,
    slots: Slots<T>,
}

impl<T> Listener<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 等待回复。无论结果如何，返回后监听器都已注销。
    pub async fn wait(self) -> Result<T, CorrelationError> {
        let mut listener = self;
        let outcome = if listener.timeout.is_zero() {
            (&mut listener.receiver)
                .await
                .map_err(|_| CorrelationError::ChannelClosed(listener.id.clone()))
        } else {
            match tokio::time::timeout(listener.timeout, &mut listener.receiver).await {
                Ok(Ok(payload)) => Ok(payload),
                Ok(Err(_)) => Err(CorrelationError::ChannelClosed(listener.id.clone())),
                Err(_) => {
                    tracing::debug!(
                        target: "twin.correlation",
                        id = %listener.id,
                        timeout_ms = listener.timeout.as_millis() as u64,
                        "listener_timeout"
                    );
                    Err(CorrelationError::Timeout(listener.id.clone()))
                }
            }
        };
        drop(listener);
        outcome
    }
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.slots
            .remove_if(&self.id, |_, slot| slot.generation == generation);
    }
}

impl<T> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听器；timeout 为零表示一直等待。
    pub fn register(
        &self,
        id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Listener<T>, CorrelationError> {
        let id = id.into();
        let (sender, receiver) = oneshot::channel();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        match self.slots.entry(id.clone()) {
            Entry::Occupied(_) => return Err(CorrelationError::AlreadyRegistered(id)),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot { generation, sender });
            }
        }
        Ok(Listener {
            id,
            generation,
            timeout,
            receiver,
            slots: Arc::clone(&self.slots),
        })
    }

    /// 按 ID 投递回复，恰好一次。未知 ID 返回 false。
    pub fn dispatch(&self, id: &str, payload: T) -> bool {
        let Some((_, slot)) = self.slots.remove(id) else {
            tracing::debug!(target: "twin.correlation", id = %id, "listener_not_found");
            return false;
        };
        // 接收端已放弃等待时发送失败，同样视为丢弃
        slot.sender.send(payload).is_ok()
    }

    /// 主动注销并关闭通道。
    pub fn unregister(&self, listener: Listener<T>) {
        drop(listener);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_after_drop_returns_false() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let listener = registry.register("a", Duration::from_secs(1)).expect("register");
        drop(listener);
        assert!(!registry.contains("a"));
        assert!(!registry.dispatch("a", 1));
    }

    #[tokio::test]
    async fn stale_listener_does_not_remove_new_registration() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let first = registry.register("a", Duration::from_secs(1)).expect("register");
        assert!(registry.dispatch("a", 1));
        let second = registry.register("a", Duration::from_secs(1)).expect("register again");
        drop(first);
        assert!(registry.contains("a"));
        assert!(registry.dispatch("a", 2));
        assert_eq!(second.wait().await, Ok(2));
    }
}
