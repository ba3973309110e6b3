//! 孪生服务入口：装配存储、MQTT 传输与同步引擎，并提供 HTTP 管理接口。

mod bootstrap;
mod handlers;
mod middleware;
mod routes;
mod utils;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use twin_config::AppConfig;
use twin_engine::TwinEngine;
use twin_telemetry::init_tracing;

#[derive(Clone)]
pub struct AppState {
    pub engine: TwinEngine,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let (engine, mqtt_task) = bootstrap::build_engine(&config, cancel.clone()).await?;
    let driver = tokio::spawn({
        let engine = engine.clone();
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    if config.http_enabled {
        let app = routes::create_router(AppState { engine });
        let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
        info!(target: "twin.server", http_addr = %config.http_addr, "http_listening");
        let shutdown = cancel.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
    } else {
        cancel.cancelled().await;
    }

    // HTTP 异常退出时也要停掉引擎与 MQTT 循环
    cancel.cancel();
    driver.await?;
    mqtt_task.await?;
    info!(target: "twin.server", "server_stopped");
    Ok(())
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(target: "twin.server", "shutdown_requested");
                cancel.cancel();
            }
            Err(err) => {
                warn!(target: "twin.server", error = %err, "signal_listener_failed");
            }
        }
    });
}
