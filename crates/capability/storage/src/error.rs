//! 存储层错误类型：统一封装数据库、缓存与数据解码错误。

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("lock poisoned")]
    Lock,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
