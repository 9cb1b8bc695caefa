//! 应用运行配置与资产清单加载。

use domain::AssetIdentity;
use serde::Deserialize;
use serde_json::Value;
use skc_protocol::DriverSpec;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid asset file: {0}")]
    Parse(String),
    #[error("asset '{id}': {message}")]
    Asset { id: String, message: String },
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub poll_hz: u32,
    pub history_seconds: u64,
    pub assets_path: PathBuf,
    pub records_dir: PathBuf,
    pub http_addr: String,
    pub status_interval_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置（测试时无需修改进程环境）。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_name = lookup("SKC_APP_NAME").unwrap_or_else(|| "NORD SKC".to_string());
        let poll_hz = read_with_default(&lookup, "SKC_POLL_HZ", 1u32)?.max(1);
        let history_seconds = read_with_default(&lookup, "SKC_HISTORY_SECONDS", 900u64)?;
        let assets_path = lookup("SKC_ASSETS_PATH")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("assets.json"));
        let records_dir = lookup("SKC_RECORDS_DIR")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("records"));
        let http_addr = lookup("SKC_HTTP_ADDR").unwrap_or_else(|| "127.0.0.1:8090".to_string());
        let status_interval_ms = read_with_default(&lookup, "SKC_STATUS_INTERVAL_MS", 1000u64)?;
        if status_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "SKC_STATUS_INTERVAL_MS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            app_name,
            poll_hz,
            history_seconds,
            assets_path,
            records_dir,
            http_addr,
            status_interval_ms,
        })
    }

    /// 轮询周期（1 / poll_hz）
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.poll_hz.max(1)))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}

fn read_with_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        _ => Ok(default),
    }
}

/// 资产清单中的一项。
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDescriptor {
    pub id: String,
    #[serde(default)]
    pub fleet_no: u32,
    #[serde(default)]
    pub plate: String,
    #[serde(flatten)]
    pub driver: DriverSpec,
}

impl AssetDescriptor {
    pub fn identity(&self) -> AssetIdentity {
        AssetIdentity::new(self.id.clone(), self.fleet_no, self.plate.clone())
    }
}

#[derive(Debug, Deserialize)]
struct AssetsFile {
    #[serde(default)]
    assets: Vec<Value>,
}

/// 读取并校验资产清单文件。
pub fn load_assets(path: &Path) -> Result<Vec<AssetDescriptor>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_assets(&text)
}

/// 解析资产清单。
///
/// 文件无法解析或出现重复 id 时整体失败；单个资产的配置错误（未知类型、缺少参数、
/// 参数越界）只排除该资产，记录告警后继续。
pub fn parse_assets(text: &str) -> Result<Vec<AssetDescriptor>, ConfigError> {
    let file: AssetsFile =
        serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;

    let mut seen = HashSet::new();
    let mut assets = Vec::with_capacity(file.assets.len());
    for (index, entry) in file.assets.into_iter().enumerate() {
        if let Some(id) = entry_id(&entry).filter(|id| !id.trim().is_empty()) {
            if !seen.insert(id.to_string()) {
                return Err(ConfigError::Asset {
                    id: id.to_string(),
                    message: "duplicate id".to_string(),
                });
            }
        }
        match parse_entry(entry) {
            Ok(asset) => assets.push(asset),
            Err(err) => warn!(target: "skc.config", index, error = %err, "asset_rejected"),
        }
    }
    Ok(assets)
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}

fn parse_entry(entry: Value) -> Result<AssetDescriptor, ConfigError> {
    let id = entry_id(&entry).unwrap_or("<no id>").to_string();
    let asset: AssetDescriptor =
        serde_json::from_value(entry).map_err(|err| ConfigError::Asset {
            id: id.clone(),
            message: err.to_string(),
        })?;
    if asset.id.trim().is_empty() {
        return Err(ConfigError::Asset {
            id,
            message: "empty id".to_string(),
        });
    }
    asset.driver.validate().map_err(|err| ConfigError::Asset {
        id,
        message: err.to_string(),
    })?;
    Ok(asset)
}
