//! 实时视图 handlers（视图须已打开，否则 409 VIEW.CLOSED）

use crate::AppState;
use crate::utils::response::{fleet_error, live_view_to_dto, ok};
use api_contract::{LiveQuery, RecordingDto, TestModeRequest, ViewStatusDto};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};

/// GET /assets/{id}/live[?series=true]
pub async fn get_live(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Query(query): Query<LiveQuery>,
) -> Response {
    let view_ref = match state.fleet.view(&asset_id).await {
        Ok(view_ref) => view_ref,
        Err(err) => return fleet_error(err),
    };
    let view = view_ref.view.lock().await;
    ok(live_view_to_dto(&view_ref, &view, query.series))
}

pub async fn start_recording(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Response {
    let view_ref = match state.fleet.view(&asset_id).await {
        Ok(view_ref) => view_ref,
        Err(err) => return fleet_error(err),
    };
    let mut view = view_ref.view.lock().await;
    view.start_recording();
    ok(RecordingDto {
        asset_id,
        active: true,
        points: 0,
        status: view.status().to_string(),
        path: None,
    })
}

pub async fn stop_recording(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Response {
    let view_ref = match state.fleet.view(&asset_id).await {
        Ok(view_ref) => view_ref,
        Err(err) => return fleet_error(err),
    };
    let mut view = view_ref.view.lock().await;
    let points = view.stop_recording();
    ok(RecordingDto {
        asset_id,
        active: false,
        points,
        status: view.status().to_string(),
        path: None,
    })
}

/// 导出当前录制内容为 CSV
pub async fn export_recording(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Response {
    let view_ref = match state.fleet.view(&asset_id).await {
        Ok(view_ref) => view_ref,
        Err(err) => return fleet_error(err),
    };
    let mut view = view_ref.view.lock().await;
    match view.export() {
        Ok(path) => ok(RecordingDto {
            asset_id,
            active: view.recording().is_active(),
            points: view.recording().len(),
            status: view.status().to_string(),
            path: Some(path.display().to_string()),
        }),
        Err(err) => fleet_error(err.into()),
    }
}

pub async fn clear_chart(State(state): State<AppState>, Path(asset_id): Path<String>) -> Response {
    let view_ref = match state.fleet.view(&asset_id).await {
        Ok(view_ref) => view_ref,
        Err(err) => return fleet_error(err),
    };
    let mut view = view_ref.view.lock().await;
    view.clear();
    ok(ViewStatusDto {
        asset_id,
        status: view.status().to_string(),
    })
}

pub async fn set_test_mode(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Json(req): Json<TestModeRequest>,
) -> Response {
    match state.fleet.set_test_mode(&asset_id, req.enabled).await {
        Ok(()) => ok(ViewStatusDto {
            status: format!(
                "{asset_id}: test mode {}",
                if req.enabled { "on" } else { "off" }
            ),
            asset_id,
        }),
        Err(err) => fleet_error(err),
    }
}
