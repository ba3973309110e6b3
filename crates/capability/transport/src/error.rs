use api_contract::ContractError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Contract(#[from] ContractError),
}
