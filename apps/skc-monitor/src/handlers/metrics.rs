//! 健康检查与采集计数快照
//!
//! - GET /health
//! - GET /metrics

use crate::AppState;
use crate::utils::response::{metrics_to_dto, ok};
use axum::{Json, extract::State, response::{IntoResponse, Response}};
use skc_telemetry::metrics;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "app": &*state.app_name,
        "assets": state.fleet.asset_count(),
    }))
}

pub async fn get_metrics() -> Response {
    ok(metrics_to_dto(metrics().snapshot()))
}
