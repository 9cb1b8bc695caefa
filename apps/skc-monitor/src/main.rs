//! 车队采集运行时：资产注册表、后台状态探测与 HTTP API，附请求追踪 ID。

mod fleet;
mod handlers;
mod routes;
mod utils;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use fleet::{Fleet, FleetSettings, spawn_status_probe};
use skc_config::{AppConfig, load_assets};
use skc_telemetry::{init_tracing, new_request_ids};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info};

#[derive(Clone)]
pub struct AppState {
    pub app_name: Arc<str>,
    pub fleet: Arc<Fleet>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    // 资产清单：文件不可读、无法解析或 id 重复时失败；单个无效资产记录告警后跳过
    let assets = load_assets(&config.assets_path)?;
    info!(
        target: "skc.fleet",
        app = %config.app_name,
        assets = assets.len(),
        path = %config.assets_path.display(),
        poll_hz = config.poll_hz,
        "assets_loaded"
    );
    let fleet = Arc::new(Fleet::new(assets, FleetSettings::from_config(&config)));
    let probe = spawn_status_probe(Arc::clone(&fleet), config.status_interval());

    let state = AppState {
        app_name: Arc::from(config.app_name.as_str()),
        fleet: Arc::clone(&fleet),
    };
    let app = routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "skc.fleet", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    probe.abort();
    fleet.shutdown().await;
    info!(target: "skc.fleet", "shutdown_complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "ctrl_c handler failed");
    }
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    // 生成 request_id 与 trace_id，并注入请求扩展与日志
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    if response.status().is_server_error() {
        tracing::warn!(
            target: "skc.http",
            request_id = %ids.request_id,
            status = response.status().as_u16(),
            path = %path,
            "request_failed"
        );
    }
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
