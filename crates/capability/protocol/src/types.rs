//! 协议相关类型定义

use crate::error::ProtocolError;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// 寄存器数值类型（S7 约定，大端）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 32位 IEEE-754 浮点
    Real,
    /// 16位有符号整数
    Int,
    /// 32位有符号整数
    Dint,
}

impl DataType {
    /// 解析类型名（大小写不敏感）
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "real" => Some(Self::Real),
            "int" => Some(Self::Int),
            "dint" => Some(Self::Dint),
            _ => None,
        }
    }

    /// 编码宽度（字节）
    pub fn width(self) -> usize {
        match self {
            Self::Real | Self::Dint => 4,
            Self::Int => 2,
        }
    }

    /// 将原始字节解码为 f64
    pub fn decode(self, raw: &[u8]) -> Option<f64> {
        let value = match self {
            Self::Real => f32::from_be_bytes(raw.try_into().ok()?) as f64,
            Self::Int => i16::from_be_bytes(raw.try_into().ok()?) as f64,
            Self::Dint => i32::from_be_bytes(raw.try_into().ok()?) as f64,
        };
        Some(value)
    }
}

/// 按标签声明的类型解码原始字节。
///
/// 未知类型与长度不符均返回带标签名的错误。
pub fn decode_tag(tag: &TagSpec, raw: &[u8]) -> Result<f64, ProtocolError> {
    let data_type = DataType::parse(&tag.dtype).ok_or_else(|| ProtocolError::Decode {
        tag: tag.name.clone(),
        message: format!("unsupported dtype: {}", tag.dtype),
    })?;
    data_type.decode(raw).ok_or_else(|| ProtocolError::Decode {
        tag: tag.name.clone(),
        message: format!(
            "{} expects {} bytes, got {}",
            tag.dtype,
            data_type.width(),
            raw.len()
        ),
    })
}

/// 标签地址：数据块内的一段字节区域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAddress {
    /// 数据块编号
    #[serde(alias = "db")]
    pub block: u16,
    /// 块内起始字节偏移
    #[serde(alias = "start")]
    pub offset: u32,
    /// 读取长度（字节）
    pub size: u16,
    /// 数值类型名（REAL / INT / DINT）
    pub dtype: String,
}

/// 命名标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSpec {
    pub name: String,
    pub block: u16,
    pub offset: u32,
    pub size: u16,
    pub dtype: String,
}

impl TagSpec {
    pub fn new(name: impl Into<String>, address: TagAddress) -> Self {
        Self {
            name: name.into(),
            block: address.block,
            offset: address.offset,
            size: address.size,
            dtype: address.dtype,
        }
    }
}

/// 按文档声明顺序反序列化 `{ name: {block, offset, size, dtype} }` 标签表。
pub fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<TagSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    struct TagsVisitor;

    impl<'de> Visitor<'de> for TagsVisitor {
        type Value = Vec<TagSpec>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of tag name to {block, offset, size, dtype}")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut tags = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, address)) = map.next_entry::<String, TagAddress>()? {
                tags.push(TagSpec::new(name, address));
            }
            Ok(tags)
        }
    }

    deserializer.deserialize_map(TagsVisitor)
}

/// 超时秒数转换；非正、非有限、过小或超出 `Duration` 范围都是配置错误
pub(crate) fn timeout_from_secs(driver: &str, secs: f64) -> Result<Duration, ProtocolError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(timeout) if secs > 0.0 && !timeout.is_zero() => Ok(timeout),
        _ => Err(ProtocolError::Config(format!(
            "{driver}: invalid timeout_s {secs}"
        ))),
    }
}
