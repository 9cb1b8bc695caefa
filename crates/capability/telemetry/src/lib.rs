//! 追踪初始化、请求 ID 与采集计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 采集计数快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reads_ok: u64,
    pub reads_failed: u64,
    pub reconnect_attempts: u64,
    pub reconnect_successes: u64,
    pub connect_failures: u64,
    pub probes: u64,
    pub samples_recorded: u64,
    pub exports_written: u64,
}

/// 进程级采集计数。
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    reads_ok: AtomicU64,
    reads_failed: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnect_successes: AtomicU64,
    connect_failures: AtomicU64,
    probes: AtomicU64,
    samples_recorded: AtomicU64,
    exports_written: AtomicU64,
}

impl AcquisitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads_ok: self.reads_ok.load(Ordering::Relaxed),
            reads_failed: self.reads_failed.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            reconnect_successes: self.reconnect_successes.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            samples_recorded: self.samples_recorded.load(Ordering::Relaxed),
            exports_written: self.exports_written.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<AcquisitionMetrics> = OnceLock::new();

/// 获取全局计数实例。
pub fn metrics() -> &'static AcquisitionMetrics {
    METRICS.get_or_init(AcquisitionMetrics::new)
}

/// 初始化 tracing（默认 info，可用 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录一次读取结果。
pub fn record_read(ok: bool) {
    let counter = if ok {
        &metrics().reads_ok
    } else {
        &metrics().reads_failed
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次重连尝试及其结果。
pub fn record_reconnect(success: bool) {
    let metrics = metrics();
    metrics.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    if success {
        metrics.reconnect_successes.fetch_add(1, Ordering::Relaxed);
    }
}

/// 记录连接失败次数（操作员发起的连接与后台探测）。
pub fn record_connect_failure() {
    metrics().connect_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录状态探测次数。
pub fn record_probe() {
    metrics().probes.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入录制会话的样本数。
pub fn record_sample_recorded() {
    metrics().samples_recorded.fetch_add(1, Ordering::Relaxed);
}

/// 记录导出文件数。
pub fn record_export_written() {
    metrics().exports_written.fetch_add(1, Ordering::Relaxed);
}
