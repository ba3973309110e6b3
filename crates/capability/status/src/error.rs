use twin_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("no such device: {0}")]
    NoSuchDevice(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("status cache lock poisoned")]
    Lock,
}
