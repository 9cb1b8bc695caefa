//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    /// 失败但附带数据（例如操作员提示）。
    pub fn failure(code: impl Into<String>, message: impl Into<String>, data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::error(code, message)
        }
    }
}

/// 资产列表项。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDto {
    pub id: String,
    pub fleet_no: u32,
    pub fleet_label: String,
    pub plate: String,
    pub driver_type: String,
    pub address: String,
    pub link_state: String,
    /// 后台探测结果；尚未探测或正在监视时为空
    pub online: Option<bool>,
    pub monitoring: bool,
    pub connecting: bool,
    pub last_probe_ms: Option<i64>,
}

/// 单个字段的当前值。
#[derive(Debug, Clone, Serialize)]
pub struct FieldValueDto {
    pub name: String,
    pub value: f64,
}

/// 单个字段的曲线点 `[ts, value]`。
#[derive(Debug, Clone, Serialize)]
pub struct FieldSeriesDto {
    pub name: String,
    pub points: Vec<[f64; 2]>,
}

/// 实时视图查询参数。
#[derive(Debug, Default, Deserialize)]
pub struct LiveQuery {
    #[serde(default)]
    pub series: bool,
}

/// 实时视图快照。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveViewDto {
    pub asset_id: String,
    pub status: String,
    pub link_state: String,
    pub test_mode: bool,
    pub recording: bool,
    pub recorded_points: usize,
    pub last_update: Option<f64>,
    pub last_error: Option<String>,
    pub values: Vec<FieldValueDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<FieldSeriesDto>>,
}

/// 连接结果。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResultDto {
    pub asset_id: String,
    pub link_state: String,
}

/// 面向操作员的连接失败提示。
#[derive(Debug, Clone, Serialize)]
pub struct OperatorNoticeDto {
    pub kind: String,
    pub title: String,
    pub header: String,
    pub body: String,
    pub details: String,
}

/// 视图操作后的状态行。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStatusDto {
    pub asset_id: String,
    pub status: String,
}

/// 录制操作结果。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingDto {
    pub asset_id: String,
    pub active: bool,
    pub points: usize,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// 测试模式开关。
#[derive(Debug, Deserialize)]
pub struct TestModeRequest {
    pub enabled: bool,
}

/// 采集计数快照。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub reads_ok: u64,
    pub reads_failed: u64,
    pub reconnect_attempts: u64,
    pub reconnect_successes: u64,
    pub connect_failures: u64,
    pub probes: u64,
    pub samples_recorded: u64,
    pub exports_written: u64,
}
