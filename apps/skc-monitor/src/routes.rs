//! 路由定义
//!
//! - 健康检查：/health
//! - 资产与连接：/api/assets/*
//! - 实时视图与录制：/api/assets/{id}/live, /recording/*, /clear, /test-mode
//! - 采集计数：/api/metrics

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{delete, get, post},
};

/// 创建 API 路由（挂载在 /api 下）
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/assets", get(list_assets))
        .route("/assets/:asset_id/connect", post(connect_asset))
        .route(
            "/assets/:asset_id/monitor",
            post(open_monitor).delete(close_monitor),
        )
        .route(
            "/assets/:asset_id/connection",
            delete(teardown_connection),
        )
        .route("/assets/:asset_id/live", get(get_live))
        .route("/assets/:asset_id/recording/start", post(start_recording))
        .route("/assets/:asset_id/recording/stop", post(stop_recording))
        .route("/assets/:asset_id/recording/export", post(export_recording))
        .route("/assets/:asset_id/clear", post(clear_chart))
        .route("/assets/:asset_id/test-mode", post(set_test_mode))
        .route("/metrics", get(get_metrics))
}

/// 完整应用路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", create_api_router())
        .with_state(state)
}
