//! 追踪初始化、请求 ID 与进程级计数器。

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub inbound_requests: u64,
    pub inbound_responses: u64,
    pub inbound_rejected: u64,
    pub replies_sent: u64,
    pub publish_failures: u64,
    pub sync_requests: u64,
    pub sync_timeouts: u64,
    pub sync_failures: u64,
    pub replies_correlated: u64,
    pub replies_unmatched: u64,
    pub pool_saturated: u64,
    pub reported_batches: u64,
    pub retry_attempts: u64,
    pub retry_successes: u64,
    pub retry_expired: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    inbound_requests: AtomicU64,
    inbound_responses: AtomicU64,
    inbound_rejected: AtomicU64,
    replies_sent: AtomicU64,
    publish_failures: AtomicU64,
    sync_requests: AtomicU64,
    sync_timeouts: AtomicU64,
    sync_failures: AtomicU64,
    replies_correlated: AtomicU64,
    replies_unmatched: AtomicU64,
    pool_saturated: AtomicU64,
    reported_batches: AtomicU64,
    retry_attempts: AtomicU64,
    retry_successes: AtomicU64,
    retry_expired: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            inbound_requests: AtomicU64::new(0),
            inbound_responses: AtomicU64::new(0),
            inbound_rejected: AtomicU64::new(0),
            replies_sent: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            sync_requests: AtomicU64::new(0),
            sync_timeouts: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            replies_correlated: AtomicU64::new(0),
            replies_unmatched: AtomicU64::new(0),
            pool_saturated: AtomicU64::new(0),
            reported_batches: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            retry_successes: AtomicU64::new(0),
            retry_expired: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inbound_requests: self.inbound_requests.load(Ordering::Relaxed),
            inbound_responses: self.inbound_responses.load(Ordering::Relaxed),
            inbound_rejected: self.inbound_rejected.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            sync_requests: self.sync_requests.load(Ordering::Relaxed),
            sync_timeouts: self.sync_timeouts.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            replies_correlated: self.replies_correlated.load(Ordering::Relaxed),
            replies_unmatched: self.replies_unmatched.load(Ordering::Relaxed),
            pool_saturated: self.pool_saturated.load(Ordering::Relaxed),
            reported_batches: self.reported_batches.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            retry_successes: self.retry_successes.load(Ordering::Relaxed),
            retry_expired: self.retry_expired.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可由 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录 edge 请求接收次数。
pub fn record_inbound_request() {
    metrics().inbound_requests.fetch_add(1, Ordering::Relaxed);
}

/// 记录 edge 回复接收次数。
pub fn record_inbound_response() {
    metrics().inbound_responses.fetch_add(1, Ordering::Relaxed);
}

/// 记录无法解析而丢弃的入站消息。
pub fn record_inbound_rejected() {
    metrics().inbound_rejected.fetch_add(1, Ordering::Relaxed);
}

pub fn record_reply_sent() {
    metrics().replies_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录发布失败（重试耗尽后）。
pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录同步请求发出次数。
pub fn record_sync_request() {
    metrics().sync_requests.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sync_timeout() {
    metrics().sync_timeouts.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sync_failure() {
    metrics().sync_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录回复成功匹配到等待方。
pub fn record_reply_correlated() {
    metrics().replies_correlated.fetch_add(1, Ordering::Relaxed);
}

/// 记录无等待方的回复。
pub fn record_reply_unmatched() {
    metrics().replies_unmatched.fetch_add(1, Ordering::Relaxed);
}

/// 记录工作池已满、入站循环需等待的次数。
pub fn record_pool_saturated() {
    metrics().pool_saturated.fetch_add(1, Ordering::Relaxed);
}

pub fn record_reported_batch() {
    metrics().reported_batches.fetch_add(1, Ordering::Relaxed);
}

pub fn record_retry_attempt() {
    metrics().retry_attempts.fetch_add(1, Ordering::Relaxed);
}

pub fn record_retry_success() {
    metrics().retry_successes.fetch_add(1, Ordering::Relaxed);
}

/// 记录待重试条目全部过期被丢弃。
pub fn record_retry_expired() {
    metrics().retry_expired.fetch_add(1, Ordering::Relaxed);
}
