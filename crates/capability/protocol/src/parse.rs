//! 行协议应答解析
//!
//! - `positional`：逗号分隔，至少 16 个字段，第 3..15 位为 12 个浮点通道。
//! - `numeric_scan`：逗号分隔，丢弃空字段与无法解析的字段，只保留数值。

use crate::error::ProtocolError;
use domain::FieldValues;
use serde::{Deserialize, Serialize};

/// 定位解析要求的最少字段数
pub const POSITIONAL_MIN_FIELDS: usize = 16;
/// 定位解析的通道数
pub const POSITIONAL_CHANNELS: usize = 12;
const POSITIONAL_FIRST: usize = 3;
const EXCERPT_CHARS: usize = 120;

/// 解析策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineParser {
    #[default]
    Positional,
    NumericScan,
}

impl LineParser {
    /// 解析一行应答；`field_names` 为空时生成 `field_01..`
    pub fn parse(self, line: &str, field_names: &[String]) -> Result<FieldValues, ProtocolError> {
        match self {
            LineParser::Positional => parse_positional(line, field_names),
            LineParser::NumericScan => parse_numeric_scan(line, field_names),
        }
    }
}

fn parse_positional(line: &str, field_names: &[String]) -> Result<FieldValues, ProtocolError> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < POSITIONAL_MIN_FIELDS {
        return Err(ProtocolError::Parse(format!(
            "bad reply (fields={}): {}",
            parts.len(),
            excerpt(line)
        )));
    }

    let window = &parts[POSITIONAL_FIRST..POSITIONAL_FIRST + POSITIONAL_CHANNELS];
    let mut numbers = Vec::with_capacity(POSITIONAL_CHANNELS);
    for (index, token) in window.iter().enumerate() {
        let value = token.parse::<f64>().map_err(|_| {
            ProtocolError::Parse(format!(
                "cannot parse floats (fields={}): field {} is '{}'; line={}",
                parts.len(),
                POSITIONAL_FIRST + index,
                token,
                excerpt(line)
            ))
        })?;
        numbers.push(value);
    }

    Ok(zip_names(field_names, numbers))
}

fn parse_numeric_scan(line: &str, field_names: &[String]) -> Result<FieldValues, ProtocolError> {
    let numbers: Vec<f64> = line
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<f64>().ok())
        .collect();

    if numbers.is_empty() {
        return Err(ProtocolError::Parse(format!(
            "no numeric fields in reply: {}",
            excerpt(line)
        )));
    }

    Ok(zip_names(field_names, numbers))
}

/// 名称数量与数值一致时使用配置名称，否则生成 `field_NN`
fn zip_names(field_names: &[String], numbers: Vec<f64>) -> FieldValues {
    if field_names.len() == numbers.len() {
        field_names.iter().cloned().zip(numbers).collect()
    } else {
        numbers
            .into_iter()
            .enumerate()
            .map(|(index, value)| (synthesized_name(index), value))
            .collect()
    }
}

fn synthesized_name(index: usize) -> String {
    format!("field_{:02}", index + 1)
}

fn excerpt(line: &str) -> String {
    line.chars().take(EXCERPT_CHARS).collect()
}
