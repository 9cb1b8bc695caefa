pub mod asset;
pub mod data;

pub use asset::AssetIdentity;
pub use data::{FieldValues, ReadResult, Sample};

/// 当前 Unix 时间戳（秒，含小数部分）。
pub fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// 当前 Unix 时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
