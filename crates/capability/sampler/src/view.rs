use domain::{AssetIdentity, FieldValues, ReadResult};
use skc_diagnostics::status_line;
use skc_history::{HistoryError, RecordingSession, TimeSeriesBuffer};
use skc_telemetry::{record_export_written, record_sample_recorded};
use std::path::PathBuf;
use tracing::{debug, warn};

/// 单个资产的实时视图：曲线缓冲、录制会话与状态行。
pub struct LiveView {
    identity: AssetIdentity,
    buffer: TimeSeriesBuffer,
    recording: RecordingSession,
    records_dir: PathBuf,
    status: String,
    last_values: FieldValues,
    last_update: Option<f64>,
    last_error: Option<String>,
}

impl LiveView {
    pub fn new(identity: AssetIdentity, buffer: TimeSeriesBuffer, records_dir: PathBuf) -> Self {
        Self {
            identity,
            buffer,
            recording: RecordingSession::new(),
            records_dir,
            status: "-".to_string(),
            last_values: FieldValues::new(),
            last_update: None,
            last_error: None,
        }
    }

    /// 应用一次 tick 的结果，返回本次新出现的字段
    pub fn apply(&mut self, timestamp: f64, result: &ReadResult) -> Vec<String> {
        if let Some(error) = result.error() {
            self.status = status_line(&self.identity.id, error);
            self.last_error = Some(error.to_string());
            return Vec::new();
        }
        self.last_error = None;

        let values = result.values();
        if values.is_empty() {
            self.status = format!("{}: OK (no data)", self.identity.id);
            return Vec::new();
        }

        let created = self.buffer.append_all(timestamp, values);
        if !created.is_empty() {
            debug!(target: "skc.sampler", asset_id = %self.identity.id, fields = ?created, "fields_discovered");
        }
        if self.recording.push(timestamp, values) {
            record_sample_recorded();
        } else {
            self.status = format!("{}: OK ({} values)", self.identity.id, values.len());
        }
        self.last_values = values.clone();
        self.last_update = Some(timestamp);
        created
    }

    pub fn start_recording(&mut self) {
        self.recording.start();
        self.status = format!("{}: recording started", self.identity.id);
    }

    pub fn stop_recording(&mut self) -> usize {
        let points = self.recording.stop();
        self.status = format!("{}: recording stopped ({} points)", self.identity.id, points);
        points
    }

    pub fn export(&mut self) -> Result<PathBuf, HistoryError> {
        match self.recording.export(&self.records_dir, &self.identity) {
            Ok(path) => {
                record_export_written();
                self.status = format!("{}: saved -> {}", self.identity.id, path.display());
                Ok(path)
            }
            Err(HistoryError::Empty) => {
                self.status = format!("{}: nothing to save", self.identity.id);
                Err(HistoryError::Empty)
            }
            Err(err) => {
                warn!(target: "skc.sampler", asset_id = %self.identity.id, error = %err, "export_failed");
                self.status = format!("{}: save failed: {}", self.identity.id, err);
                Err(err)
            }
        }
    }

    /// 清空曲线（保留字段槽）
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.status = format!("{}: chart cleared", self.identity.id);
    }

    pub fn identity(&self) -> &AssetIdentity {
        &self.identity
    }

    pub fn buffer(&self) -> &TimeSeriesBuffer {
        &self.buffer
    }

    pub fn recording(&self) -> &RecordingSession {
        &self.recording
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_values(&self) -> &FieldValues {
        &self.last_values
    }

    pub fn last_update(&self) -> Option<f64> {
        self.last_update
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
