/// 按首次出现顺序排列的字段值映射。
///
/// 驱动不必预先声明字段集合，字段名在运行时被发现；
/// 重复插入同名字段只更新值，不改变位置。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    entries: Vec<(String, f64)>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(_, value)| *value)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut values = FieldValues::new();
        for (name, value) in iter {
            values.insert(name, value);
        }
        values
    }
}

impl IntoIterator for FieldValues {
    type Item = (String, f64);
    type IntoIter = std::vec::IntoIter<(String, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// 单次读取结果。
///
/// 成功时 `error` 为空，失败时 `values` 为空；构造后不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    ok: bool,
    values: FieldValues,
    error: Option<String>,
}

impl ReadResult {
    pub fn success(values: FieldValues) -> Self {
        Self {
            ok: true,
            values,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            values: FieldValues::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// 录制会话中的一个采样点。
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Unix 时间戳（秒）
    pub timestamp: f64,
    pub values: FieldValues,
}

impl Sample {
    pub fn new(timestamp: f64, values: FieldValues) -> Self {
        Self { timestamp, values }
    }
}
