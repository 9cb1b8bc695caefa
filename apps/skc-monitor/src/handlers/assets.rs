//! 资产与连接 handlers
//!
//! - GET /assets - 资产列表（按车队编号排序，附探测状态）
//! - POST /assets/{id}/connect - 显式连接，失败时返回操作员提示
//! - POST /assets/{id}/monitor - 打开实时视图（开始轮询）
//! - DELETE /assets/{id}/monitor - 关闭实时视图（保持连接）
//! - DELETE /assets/{id}/connection - 拆除连接

use crate::AppState;
use crate::utils::response::{fleet_error, ok};
use api_contract::{ConnectResultDto, ViewStatusDto};
use axum::{
    extract::{Path, State},
    response::Response,
};
use tracing::warn;

pub async fn list_assets(State(state): State<AppState>) -> Response {
    ok(state.fleet.list().await)
}

pub async fn connect_asset(State(state): State<AppState>, Path(asset_id): Path<String>) -> Response {
    match state.fleet.connect(&asset_id).await {
        Ok(link) => ok(ConnectResultDto {
            asset_id,
            link_state: link.as_str().to_string(),
        }),
        Err(err) => {
            warn!(target: "skc.fleet", asset_id = %asset_id, error = %err, "connect_rejected");
            fleet_error(err)
        }
    }
}

pub async fn open_monitor(State(state): State<AppState>, Path(asset_id): Path<String>) -> Response {
    match state.fleet.open_view(&asset_id).await {
        Ok(link) => ok(ConnectResultDto {
            asset_id,
            link_state: link.as_str().to_string(),
        }),
        Err(err) => fleet_error(err),
    }
}

pub async fn close_monitor(State(state): State<AppState>, Path(asset_id): Path<String>) -> Response {
    match state.fleet.close_view(&asset_id).await {
        Ok(()) => ok(ViewStatusDto {
            status: format!("{asset_id}: view closed"),
            asset_id,
        }),
        Err(err) => fleet_error(err),
    }
}

pub async fn teardown_connection(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Response {
    match state.fleet.teardown(&asset_id).await {
        Ok(()) => ok(ViewStatusDto {
            status: format!("{asset_id}: disconnected"),
            asset_id,
        }),
        Err(err) => fleet_error(err),
    }
}
