use crate::HistoryError;
use domain::{AssetIdentity, FieldValues, Sample};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// 录制会话：开始时丢弃旧数据，停止后保留以供导出。
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    active: bool,
    samples: Vec<Sample>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.samples.clear();
        self.active = true;
    }

    /// 停止录制，返回已采集的点数
    pub fn stop(&mut self) -> usize {
        self.active = false;
        self.samples.len()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 仅在录制中追加，返回是否已追加
    pub fn push(&mut self, timestamp: f64, values: &FieldValues) -> bool {
        if !self.active {
            return false;
        }
        self.samples.push(Sample::new(timestamp, values.clone()));
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 所有样本字段名的并集（字母序）
    pub fn columns(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .samples
            .iter()
            .flat_map(|sample| sample.values.names())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// 写出 CSV：`ts,<字段...>`，时间戳保留毫秒，缺失字段留空
    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), HistoryError> {
        if self.samples.is_empty() {
            return Err(HistoryError::Empty);
        }
        let columns = self.columns();
        let mut writer = csv::Writer::from_writer(out);

        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push("ts".to_string());
        header.extend(columns.iter().cloned());
        writer.write_record(&header)?;

        for sample in &self.samples {
            let mut row = Vec::with_capacity(columns.len() + 1);
            row.push(format!("{:.3}", sample.timestamp));
            for column in &columns {
                row.push(
                    sample
                        .values
                        .get(column)
                        .map(|value| value.to_string())
                        .unwrap_or_default(),
                );
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// 导出到 `<dir>/<id>_fleet<NN>_<ts0>.csv`，目录不存在时创建
    pub fn export(&self, dir: &Path, asset: &AssetIdentity) -> Result<PathBuf, HistoryError> {
        let first = self.samples.first().ok_or(HistoryError::Empty)?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(asset, first.timestamp));
        let file = std::fs::File::create(&path)?;
        self.write_csv(file)?;
        info!(
            target: "skc.history",
            asset_id = %asset.id,
            path = %path.display(),
            points = self.samples.len(),
            "recording_exported"
        );
        Ok(path)
    }
}

/// 由资产标识与首个样本的整数时间戳确定文件名
pub fn export_file_name(asset: &AssetIdentity, first_timestamp: f64) -> String {
    format!(
        "{}_fleet{}_{}.csv",
        asset.id,
        asset.fleet_label(),
        first_timestamp.trunc() as i64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> FieldValues {
        pairs.iter().map(|(name, value)| (*name, *value)).collect()
    }

    #[test]
    fn test_start_discards_previous_capture() {
        let mut session = RecordingSession::new();
        session.start();
        session.push(1.0, &values(&[("a", 1.0)]));
        assert_eq!(session.stop(), 1);
        assert!(!session.push(2.0, &values(&[("a", 2.0)])));

        session.start();
        assert!(session.is_empty());
        assert!(session.is_active());
    }

    #[test]
    fn test_write_csv_blank_cells() {
        let mut session = RecordingSession::new();
        session.start();
        session.push(1_700_000_000.5, &values(&[("a", 1.0)]));
        session.push(1_700_000_001.25, &values(&[("b", 2.5), ("a", 3.0)]));
        session.push(1_700_000_002.0, &values(&[("b", 4.0)]));
        session.stop();

        let mut out = Vec::new();
        session.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "ts,a,b",
                "1700000000.500,1,",
                "1700000001.250,3,2.5",
                "1700000002.000,,4",
            ]
        );
    }

    #[test]
    fn test_file_name() {
        let asset = AssetIdentity::new("J65", 3, "X");
        assert_eq!(export_file_name(&asset, 1_700_000_000.9), "J65_fleet03_1700000000.csv");
    }

    #[test]
    fn test_empty_export_fails() {
        let session = RecordingSession::new();
        let mut out = Vec::new();
        assert!(matches!(session.write_csv(&mut out), Err(HistoryError::Empty)));
    }
}
