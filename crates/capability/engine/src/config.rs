use std::time::Duration;

pub const DEFAULT_WORKER_POOL_SIZE: usize = 1024;
pub const MIN_WORKER_POOL_SIZE: usize = 512;
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DESIRED_LIFETIME_MS: i64 = 30_000;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(300);

/// 引擎运行参数。
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub worker_pool_size: usize,
    /// 同步请求等待 edge 回复的超时。
    pub rpc_timeout: Duration,
    /// 设备记录未设置期望值有效期（负值）时使用的默认值（毫秒）。
    pub desired_lifetime_ms: i64,
    pub history_capacity: usize,
    pub retry_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            desired_lifetime_ms: DEFAULT_DESIRED_LIFETIME_MS,
            history_capacity: twin_shadow::DEFAULT_HISTORY_CAPACITY,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// 修正越界取值：过小的工作池回退到默认大小，零值回退到默认值。
    pub fn sanitized(mut self) -> Self {
        if self.worker_pool_size < MIN_WORKER_POOL_SIZE {
            self.worker_pool_size = DEFAULT_WORKER_POOL_SIZE;
        }
        if self.rpc_timeout.is_zero() {
            self.rpc_timeout = DEFAULT_RPC_TIMEOUT;
        }
        if self.desired_lifetime_ms <= 0 {
            self.desired_lifetime_ms = DEFAULT_DESIRED_LIFETIME_MS;
        }
        if self.history_capacity == 0 {
            self.history_capacity = twin_shadow::DEFAULT_HISTORY_CAPACITY;
        }
        if self.retry_interval.is_zero() {
            self.retry_interval = DEFAULT_RETRY_INTERVAL;
        }
        self
    }
}
