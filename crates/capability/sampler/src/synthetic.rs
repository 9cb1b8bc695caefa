use domain::{FieldValues, ReadResult};
use std::time::Instant;

/// 测试模式数据源：按开启后的经过时间生成相位错开的正弦值，不访问驱动。
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    started: Instant,
}

impl SyntheticSource {
    pub fn start_now() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn read(&self) -> ReadResult {
        ReadResult::success(synthetic_values(self.started.elapsed().as_secs_f64()))
    }
}

/// `t` 秒时的测试值
pub fn synthetic_values(t: f64) -> FieldValues {
    let mut values = FieldValues::with_capacity(3);
    values.insert("pressure", 100.0 + 10.0 * (1.0 + (t / 3.0).sin()));
    values.insert("flow", 50.0 + 5.0 * (1.0 + (t / 2.0).sin()));
    values.insert("temp", 20.0 + 2.0 * (1.0 + (t / 5.0).sin()));
    values
}
