//! 实时曲线缓冲与录制会话。

mod buffer;
mod recording;

pub use buffer::{MIN_CAPACITY, TimeSeriesBuffer};
pub use recording::{RecordingSession, export_file_name};

/// 历史数据错误。
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("nothing to save")]
    Empty,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
