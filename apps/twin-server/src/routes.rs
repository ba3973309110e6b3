//! 路由定义
//!
//! - 健康检查与指标：/health, /metrics
//! - 设备孪生：/devices/{id}/twin, /devices/{id}/twin/desired
//! - 设备生命周期：/devices/{id}/actions/{action}
//! - Edge 在线状态：/edges/{id}/status, /edges/{id}/offline

use crate::AppState;
use crate::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/devices/:device_id/twin", get(get_device_twin))
        .route(
            "/devices/:device_id/twin/desired",
            get(get_desired_twins).put(update_desired_twins),
        )
        .route("/devices/:device_id/actions/:action", post(device_action))
        .route("/edges/:edge_id/status", post(set_edge_status))
        .route("/edges/:edge_id/offline", post(mark_edge_offline))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use domain::{DeviceState, DeviceStatus};
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use twin_engine::{EngineConfig, EngineDeps, TwinEngine};
    use twin_storage::{
        DeviceInstanceRecord, InMemoryDeviceStore, InMemoryEdgePresence, InMemorySink,
    };
    use twin_transport::ChannelTransport;

    const EDGE: &str = "edge-1";

    fn device(device_id: &str, status: DeviceStatus) -> DeviceInstanceRecord {
        DeviceInstanceRecord {
            device_id: device_id.to_string(),
            name: device_id.to_string(),
            edge_id: EDGE.to_string(),
            protocol_type: "modbus".to_string(),
            protocol: "{}".to_string(),
            os: "linux".to_string(),
            category: "meter".to_string(),
            identification_code: String::new(),
            tags: BTreeMap::new(),
            device_model_id: "model-1".to_string(),
            life_time_of_desired_value: 30_000,
            status,
            state: DeviceState::Started,
            update_ts_ms: 1,
        }
    }

    struct TestApp {
        router: Router,
        engine: TwinEngine,
        // 保持 edge 端存活，避免发送端报通道关闭
        _edge: ChannelTransport,
        cancel: CancellationToken,
        driver: Option<JoinHandle<()>>,
    }

    impl TestApp {
        fn build(devices: Vec<DeviceInstanceRecord>) -> Self {
            let store = Arc::new(InMemoryDeviceStore::new());
            for record in devices {
                store.insert_device(record).expect("insert device");
            }
            let sink = Arc::new(InMemorySink::new());
            let (core, edge) = ChannelTransport::pair();
            let engine = TwinEngine::new(
                EngineConfig::default(),
                EngineDeps {
                    transport: Arc::new(core),
                    devices: store,
                    presence: Arc::new(InMemoryEdgePresence::with_online(&[EDGE])),
                    time_series: sink.clone(),
                    forwarder: sink,
                },
            );
            Self {
                router: create_router(AppState {
                    engine: engine.clone(),
                }),
                engine,
                _edge: edge,
                cancel: CancellationToken::new(),
                driver: None,
            }
        }

        async fn start(devices: Vec<DeviceInstanceRecord>) -> Self {
            let mut app = Self::build(devices);
            let engine = app.engine.clone();
            let cancel = app.cancel.clone();
            app.driver = Some(tokio::spawn(async move { engine.run(cancel).await }));
            for _ in 0..200 {
                if app.engine.is_ready() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            assert!(app.engine.is_ready());
            app
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            body: Option<&str>,
        ) -> (StatusCode, serde_json::Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            let body = match body {
                Some(body) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(body.to_string())
                }
                None => Body::empty(),
            };
            let response = self
                .router
                .clone()
                .oneshot(builder.body(body).expect("request"))
                .await
                .expect("response");
            let status = response.status();
            let bytes = response
                .into_body()
                .collect()
                .await
                .expect("body")
                .to_bytes();
            let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            (status, value)
        }

        async fn shutdown(mut self) {
            self.cancel.cancel();
            if let Some(driver) = self.driver.take() {
                driver.await.expect("driver");
            }
        }
    }

    #[tokio::test]
    async fn health_reflects_readiness() {
        let app = TestApp::build(Vec::new());
        let (status, _) = app.send(Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let app = TestApp::start(Vec::new()).await;
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.headers().contains_key("x-trace-id"));
        app.shutdown().await;
    }

    #[tokio::test]
    async fn device_actions_validate_input() {
        let app = TestApp::start(vec![device("dev-1", DeviceStatus::Offline)]).await;

        let (status, body) = app
            .send(Method::POST, "/devices/dev-1/actions/reboot", None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID.REQUEST");

        let (status, _) = app
            .send(Method::POST, "/devices/ghost/actions/start", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send(Method::POST, "/devices/dev-1/actions/start", None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        app.shutdown().await;
    }

    #[tokio::test]
    async fn desired_update_is_visible_in_twin() {
        let app = TestApp::start(vec![device("dev-1", DeviceStatus::Offline)]).await;
        let ts = domain::now_epoch_ms();
        let payload = format!(
            r#"{{"desired_twins":[{{"svc":"energy","pn":"power","val":12,"ts":{ts}}}]}}"#
        );

        let (status, body) = app
            .send(Method::PUT, "/devices/dev-1/twin/desired", Some(&payload))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["accepted"], 1);

        let (status, body) = app
            .send(Method::GET, "/devices/dev-1/twin/desired", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["val"], 12);

        let (status, body) = app.send(Method::GET, "/devices/dev-1/twin", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["DeviceID"], "dev-1");
        app.shutdown().await;
    }

    #[tokio::test]
    async fn edge_offline_marks_devices() {
        let app = TestApp::start(vec![
            device("dev-1", DeviceStatus::Online),
            device("dev-2", DeviceStatus::Online),
        ])
        .await;

        let (status, body) = app
            .send(Method::POST, "/edges/edge-1/status", Some(r#"{"online":false}"#))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["online"], false);

        let details = app
            .engine
            .status()
            .get("dev-1")
            .await
            .expect("get")
            .expect("device");
        assert_eq!(details.status, DeviceStatus::Offline);

        let (status, body) = app.send(Method::POST, "/edges/edge-1/offline", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["devices"], 2);
        app.shutdown().await;
    }
}
