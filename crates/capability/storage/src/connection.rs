//! Postgres 连接池。

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// 设备状态写入位于单设备锁的关键路径上，连接数按并发设备数放宽。
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await?;
    Ok(pool)
}
