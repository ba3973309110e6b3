//! 入站消息分发与同步请求原语。
//!
//! - 回复直接按 pid 投递给关联层，不占用工作池
//! - 请求提交到有界工作池；池满时阻塞分发循环形成背压
//! - `send_sync_request_to_edge` 先注册监听器再发布，避免回复先于注册到达

use crate::engine::TwinEngine;
use crate::error::EngineError;
use api_contract::{Message, Request, Response};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::TryAcquireError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use twin_correlation::CorrelationError;
use twin_telemetry::{
    record_inbound_request, record_inbound_response, record_pool_saturated,
    record_reply_correlated, record_reply_unmatched, record_sync_failure, record_sync_request,
    record_sync_timeout,
};

impl TwinEngine {
    /// 分发循环：直到 cancel 触发或传输关闭。
    ///
    /// 同时托管期望值重试循环，二者随同一个取消信号退出。
    pub async fn run(&self, cancel: CancellationToken) {
        self.inner.ready.store(true, Ordering::Release);
        info!(
            target: "twin.engine",
            worker_pool_size = self.inner.config.worker_pool_size,
            rpc_timeout_ms = self.inner.config.rpc_timeout.as_millis() as u64,
            "engine_started"
        );
        let retry = tokio::spawn(self.clone().run_retry_loop(cancel.clone()));

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = self.inner.deps.transport.receive() => message,
            };
            let Some(message) = message else {
                warn!(target: "twin.engine", "transport_closed");
                break;
            };
            match message {
                Message::Response(response) => self.on_response(response),
                Message::Request(request) => {
                    record_inbound_request();
                    let engine = self.clone();
                    self.spawn_pooled(async move { engine.handle_request(request).await })
                        .await;
                }
            }
        }

        self.inner.ready.store(false, Ordering::Release);
        cancel.cancel();
        if let Err(err) = retry.await {
            warn!(target: "twin.engine", error = %err, "retry_loop_join_failed");
        }
        info!(target: "twin.engine", "engine_stopped");
    }

    fn on_response(&self, response: Response) {
        record_inbound_response();
        let pid = response.parent_id().to_string();
        if self.inner.listeners.dispatch(&pid, response) {
            record_reply_correlated();
        } else {
            record_reply_unmatched();
            debug!(target: "twin.engine", pid = %pid, "reply_unmatched");
        }
    }

    /// 在工作池中执行任务；无空闲名额时等待。
    pub(crate) async fn spawn_pooled<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let pool = self.inner.pool.clone();
        let permit = match pool.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                record_pool_saturated();
                match pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                }
            }
            Err(TryAcquireError::Closed) => return,
        };
        tokio::spawn(async move {
            let _permit = permit;
            task.await;
        });
    }

    /// 发送请求并等待 edge 回复；timeout 为零表示一直等待。
    ///
    /// 可重入：每次调用使用请求自身的 ID 注册独立的监听器。
    pub async fn send_sync_request_to_edge(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, EngineError> {
        record_sync_request();
        let request_id = request.id().to_string();
        let edge_id = request.edge_id.clone();
        let operation = request.operation;
        let resource = request.resource.clone();
        let listener = self.inner.listeners.register(request_id.clone(), timeout)?;

        if let Err(err) = self.inner.deps.transport.send(Message::Request(request)).await {
            record_sync_failure();
            self.inner.listeners.unregister(listener);
            warn!(
                target: "twin.engine",
                request_id = %request_id,
                edge_id = %edge_id,
                operation = %operation,
                error = %err,
                "edge_request_send_failed"
            );
            return Err(err.into());
        }

        match listener.wait().await {
            Ok(response) => Ok(response),
            Err(CorrelationError::Timeout(_)) => {
                record_sync_timeout();
                warn!(
                    target: "twin.engine",
                    request_id = %request_id,
                    edge_id = %edge_id,
                    operation = %operation,
                    resource = %resource,
                    timeout_ms = timeout.as_millis() as u64,
                    "edge_request_timeout"
                );
                Err(EngineError::Timeout)
            }
            Err(err) => {
                record_sync_failure();
                Err(err.into())
            }
        }
    }

    /// 以默认超时发送，并要求 edge 回复成功码。
    pub(crate) async fn call_edge(&self, request: Request) -> Result<Response, EngineError> {
        let response = self
            .send_sync_request_to_edge(request, self.inner.config.rpc_timeout)
            .await?;
        if !response.code().is_ok() {
            return Err(EngineError::EdgeReplied {
                code: response.code().clone(),
                content: response.content().to_string(),
            });
        }
        Ok(response)
    }
}
