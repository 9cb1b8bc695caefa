//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：fleet_error 将注册表错误映射为稳定错误码
//! - DTO 转换：live_view_to_dto, notice_to_dto, metrics_to_dto

use crate::fleet::{FleetError, ViewRef};
use api_contract::{
    ApiResponse, FieldSeriesDto, FieldValueDto, LiveViewDto, MetricsSnapshotDto,
    OperatorNoticeDto,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use skc_diagnostics::OperatorNotice;
use skc_history::HistoryError;
use skc_sampler::LiveView;
use skc_telemetry::MetricsSnapshot;

/// 200 + 成功封装
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 注册表错误 → HTTP 状态码与错误码
pub fn fleet_error(err: FleetError) -> Response {
    let message = err.to_string();
    match err {
        FleetError::NotFound(_) => error(StatusCode::NOT_FOUND, "ASSET.NOT_FOUND", message),
        FleetError::Busy(_) => error(StatusCode::CONFLICT, "CONNECT.BUSY", message),
        FleetError::ViewClosed(_) => error(StatusCode::CONFLICT, "VIEW.CLOSED", message),
        FleetError::Driver { .. } => error(StatusCode::BAD_REQUEST, "ASSET.INVALID", message),
        FleetError::Connect { notice, .. } => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::failure(
                "CONNECT.FAILED",
                message,
                notice_to_dto(&notice),
            )),
        )
            .into_response(),
        FleetError::History(HistoryError::Empty) => {
            error(StatusCode::CONFLICT, "RECORDING.EMPTY", message)
        }
        FleetError::History(_) => error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "RECORDING.EXPORT_FAILED",
            message,
        ),
    }
}

pub fn notice_to_dto(notice: &OperatorNotice) -> OperatorNoticeDto {
    OperatorNoticeDto {
        kind: notice.kind.as_str().to_string(),
        title: notice.title.clone(),
        header: notice.header.clone(),
        body: notice.body.clone(),
        details: notice.details.clone(),
    }
}

/// LiveView 转 LiveViewDto；`with_series` 时附带全部曲线点
pub fn live_view_to_dto(view_ref: &ViewRef, view: &LiveView, with_series: bool) -> LiveViewDto {
    let values = view
        .last_values()
        .iter()
        .map(|(name, value)| FieldValueDto {
            name: name.to_string(),
            value,
        })
        .collect();
    let series = with_series.then(|| {
        let buffer = view.buffer();
        buffer
            .fields()
            .map(|name| FieldSeriesDto {
                name: name.to_string(),
                points: buffer
                    .series(name)
                    .map(|points| points.iter().map(|(ts, value)| [*ts, *value]).collect())
                    .unwrap_or_default(),
            })
            .collect()
    });
    LiveViewDto {
        asset_id: view.identity().id.clone(),
        status: view.status().to_string(),
        link_state: view_ref.link_state.as_str().to_string(),
        test_mode: view_ref.test_mode,
        recording: view.recording().is_active(),
        recorded_points: view.recording().len(),
        last_update: view.last_update(),
        last_error: view.last_error().map(str::to_string),
        values,
        series,
    }
}

pub fn metrics_to_dto(snapshot: MetricsSnapshot) -> MetricsSnapshotDto {
    MetricsSnapshotDto {
        reads_ok: snapshot.reads_ok,
        reads_failed: snapshot.reads_failed,
        reconnect_attempts: snapshot.reconnect_attempts,
        reconnect_successes: snapshot.reconnect_successes,
        connect_failures: snapshot.connect_failures,
        probes: snapshot.probes,
        samples_recorded: snapshot.samples_recorded,
        exports_written: snapshot.exports_written,
    }
}
