use api_contract::{ContractError, ReplyCode};
use twin_correlation::CorrelationError;
use twin_status::StatusError;
use twin_storage::StorageError;
use twin_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("no such device: {0}")]
    NoSuchDevice(String),
    #[error("no such device model: {0}")]
    NoSuchDeviceModel(String),
    #[error("core is not ready")]
    CoreNotReady,
    #[error("edge is not online: {0}")]
    EdgeNotOnline(String),
    #[error("device is offline: {0}")]
    DeviceOffline(String),
    #[error("reply channel closed")]
    ChannelClosed,
    #[error("timed out waiting for edge reply")]
    Timeout,
    #[error("invalid response shape: {0}")]
    InvalidResponseShape(String),
    #[error("request already registered: {0}")]
    AlreadyRegistered(String),
    #[error("edge replied with code {code}: {content}")]
    EdgeReplied { code: ReplyCode, content: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("encode failed: {0}")]
    Encode(String),
}

impl From<CorrelationError> for EngineError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::AlreadyRegistered(id) => Self::AlreadyRegistered(id),
            CorrelationError::Timeout(_) => Self::Timeout,
            CorrelationError::ChannelClosed(_) => Self::ChannelClosed,
        }
    }
}

impl From<StatusError> for EngineError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::NoSuchDevice(id) => Self::NoSuchDevice(id),
            StatusError::Storage(err) => Self::Storage(err),
            StatusError::Lock => Self::Storage(StorageError::Lock),
        }
    }
}

impl From<ContractError> for EngineError {
    fn from(err: ContractError) -> Self {
        Self::Encode(err.to_string())
    }
}
