#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    #[error("listener already registered: {0}")]
    AlreadyRegistered(String),
    #[error("timed out waiting for reply: {0}")]
    Timeout(String),
    #[error("reply channel closed: {0}")]
    ChannelClosed(String),
}
