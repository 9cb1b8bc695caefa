use domain::FieldValues;
use std::collections::VecDeque;

/// 容量下限（点数）
pub const MIN_CAPACITY: usize = 60;

/// 每个字段一条定长时间序列；字段槽按首次出现顺序排列。
///
/// 超出容量时丢弃最旧的点。`clear()` 只清空序列，保留字段槽。
#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    capacity: usize,
    slots: Vec<(String, VecDeque<(f64, f64)>)>,
}

impl TimeSeriesBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Vec::new(),
        }
    }

    /// 容量 = max(60, history_seconds * poll_hz)
    pub fn for_window(history_seconds: u64, poll_hz: u32) -> Self {
        let points = history_seconds.saturating_mul(u64::from(poll_hz));
        let points = usize::try_from(points).unwrap_or(usize::MAX);
        Self::with_capacity(points.max(MIN_CAPACITY))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 确保字段槽存在，新建时返回 true
    pub fn ensure_field(&mut self, field: &str) -> bool {
        if self.slot_index(field).is_some() {
            return false;
        }
        self.slots.push((field.to_string(), VecDeque::new()));
        true
    }

    pub fn append(&mut self, field: &str, timestamp: f64, value: f64) {
        let index = match self.slot_index(field) {
            Some(index) => index,
            None => {
                self.slots.push((field.to_string(), VecDeque::new()));
                self.slots.len() - 1
            }
        };
        let series = &mut self.slots[index].1;
        series.push_back((timestamp, value));
        while series.len() > self.capacity {
            series.pop_front();
        }
    }

    /// 追加一次采样的全部字段，返回本次新建的字段名
    pub fn append_all(&mut self, timestamp: f64, values: &FieldValues) -> Vec<String> {
        let mut created = Vec::new();
        for (name, value) in values.iter() {
            if self.ensure_field(name) {
                created.push(name.to_string());
            }
            self.append(name, timestamp, value);
        }
        created
    }

    pub fn clear(&mut self) {
        for (_, series) in &mut self.slots {
            series.clear();
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    pub fn series(&self, field: &str) -> Option<&VecDeque<(f64, f64)>> {
        self.slot_index(field).map(|index| &self.slots[index].1)
    }

    pub fn len(&self, field: &str) -> usize {
        self.series(field).map_or(0, VecDeque::len)
    }

    pub fn latest(&self, field: &str) -> Option<(f64, f64)> {
        self.series(field).and_then(|series| series.back().copied())
    }

    fn slot_index(&self, field: &str) -> Option<usize> {
        self.slots.iter().position(|(name, _)| name == field)
    }
}
