use crate::error::TransportError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 指数退避策略。max_attempts 为 None 时不限次数。
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// 第 attempt 次失败后的等待时间（attempt 从 1 开始）。
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts
            .map(|max| attempt >= max)
            .unwrap_or(false)
    }
}

/// 反复执行 op 直到成功、次数耗尽或被取消。
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        attempt += 1;
        if policy.exhausted(attempt) {
            return Err(TransportError::Connect(format!("{what}: {err}")));
        }
        let delay = policy.delay_for(attempt);
        tracing::warn!(
            target: "twin.transport",
            what = %what,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "connect_retry_scheduled"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
