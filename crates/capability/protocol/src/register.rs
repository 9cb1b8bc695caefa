//! 寄存器驱动（PLC 二进制协议）
//!
//! 按声明顺序逐个标签读取数据块区域并解码；任一标签失败则整次读取失败，
//! 不返回部分结果。
//!
//! ## 配置示例
//!
//! ```json
//! {
//!   "type": "register",
//!   "host": "192.168.1.10",
//!   "rack": 0,
//!   "slot": 1,
//!   "tags": {
//!     "pressure": { "db": 10, "start": 0, "size": 4, "dtype": "REAL" },
//!     "rpm":      { "db": 10, "start": 4, "size": 2, "dtype": "INT" }
//!   }
//! }
//! ```

use crate::driver::Driver;
use crate::error::ProtocolError;
use crate::s7::S7Endpoint;
use crate::types::{decode_tag, deserialize_tags, timeout_from_secs, TagSpec};
use async_trait::async_trait;
use domain::{FieldValues, ReadResult};
use serde::Deserialize;
use tracing::{debug, warn};

/// 寄存器驱动配置
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDriverConfig {
    /// PLC 主机地址
    #[serde(alias = "ip")]
    pub host: String,
    /// ISO-on-TCP 端口（默认 102）
    #[serde(default = "default_s7_port")]
    pub port: u16,
    /// 机架号
    #[serde(default)]
    pub rack: u16,
    /// 槽号
    #[serde(default = "default_slot")]
    pub slot: u16,
    /// 连接与单次请求超时（秒）
    #[serde(default = "default_timeout_s")]
    pub timeout_s: f64,
    /// 标签表（保持声明顺序）
    #[serde(deserialize_with = "deserialize_tags")]
    pub tags: Vec<TagSpec>,
}

fn default_s7_port() -> u16 {
    102
}

fn default_slot() -> u16 {
    1
}

fn default_timeout_s() -> f64 {
    2.0
}

impl RegisterDriverConfig {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.host.trim().is_empty() {
            return Err(ProtocolError::Config("register driver: empty host".to_string()));
        }
        if self.port == 0 {
            return Err(ProtocolError::Config("register driver: port must be > 0".to_string()));
        }
        if self.rack > 7 || self.slot > 31 {
            return Err(ProtocolError::Config(format!(
                "register driver: rack/slot out of range ({}/{})",
                self.rack, self.slot
            )));
        }
        timeout_from_secs("register driver", self.timeout_s)?;
        if self.tags.is_empty() {
            return Err(ProtocolError::Config("register driver: no tags configured".to_string()));
        }
        if let Some(tag) = self.tags.iter().find(|tag| tag.size == 0) {
            return Err(ProtocolError::Config(format!(
                "register driver: tag '{}' has zero size",
                tag.name
            )));
        }
        Ok(())
    }

    /// PLC 端点；超时在此换算一次
    pub fn endpoint(&self) -> Result<S7Endpoint, ProtocolError> {
        Ok(S7Endpoint {
            host: self.host.clone(),
            port: self.port,
            rack: self.rack,
            slot: self.slot,
            timeout: timeout_from_secs("register driver", self.timeout_s)?,
        })
    }
}

/// 数据块读取接口（S7 客户端或测试替身）
#[async_trait]
pub trait BlockReader: Send {
    async fn connect(&mut self) -> Result<(), ProtocolError>;

    async fn disconnect(&mut self);

    /// 读取 `block` 中 `offset` 起的 `size` 字节
    async fn read_block(
        &mut self,
        block: u16,
        offset: u32,
        size: u16,
    ) -> Result<Vec<u8>, ProtocolError>;

    fn is_connected(&self) -> bool;
}

/// 寄存器驱动
pub struct RegisterDriver<R> {
    tags: Vec<TagSpec>,
    client: R,
}

impl<R: BlockReader> RegisterDriver<R> {
    pub fn new(tags: Vec<TagSpec>, client: R) -> Self {
        Self { tags, client }
    }

    pub fn tags(&self) -> &[TagSpec] {
        &self.tags
    }

    async fn read_all(&mut self) -> Result<FieldValues, ProtocolError> {
        let mut values = FieldValues::with_capacity(self.tags.len());
        for tag in &self.tags {
            let raw = match self.client.read_block(tag.block, tag.offset, tag.size).await {
                Ok(raw) => raw,
                Err(err) if err.breaks_channel() => {
                    warn!(target: "skc.protocol", tag = %tag.name, error = %err, "tag read failed");
                    return Err(err);
                }
                Err(err) => {
                    return Err(ProtocolError::Decode {
                        tag: tag.name.clone(),
                        message: err.to_string(),
                    });
                }
            };
            debug!(
                target: "skc.protocol",
                tag = %tag.name,
                block = tag.block,
                offset = tag.offset,
                size = tag.size,
                raw = ?raw,
                "read block"
            );
            values.insert(tag.name.clone(), decode_tag(tag, &raw)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl<R: BlockReader> Driver for RegisterDriver<R> {
    async fn connect(&mut self) -> Result<(), ProtocolError> {
        self.client.connect().await
    }

    async fn close(&mut self) {
        self.client.disconnect().await;
    }

    async fn read_once(&mut self) -> ReadResult {
        if !self.client.is_connected() {
            return ReadResult::failure(ProtocolError::NotConnected.to_string());
        }
        match self.read_all().await {
            Ok(values) => ReadResult::success(values),
            Err(err) => {
                if err.breaks_channel() {
                    warn!(target: "skc.protocol", error = %err, "register channel dropped");
                    self.client.disconnect().await;
                }
                ReadResult::failure(err.to_string())
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// 内存数据块
    #[derive(Default)]
    struct MemoryBlocks {
        connected: bool,
        blocks: HashMap<u16, Vec<u8>>,
        reads: usize,
        fail_io: bool,
    }

    #[async_trait]
    impl BlockReader for MemoryBlocks {
        async fn connect(&mut self) -> Result<(), ProtocolError> {
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.connected = false;
        }

        async fn read_block(
            &mut self,
            block: u16,
            offset: u32,
            size: u16,
        ) -> Result<Vec<u8>, ProtocolError> {
            self.reads += 1;
            if self.fail_io {
                return Err(ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            let data = self
                .blocks
                .get(&block)
                .ok_or_else(|| ProtocolError::Plc(format!("object does not exist: DB{block}")))?;
            let start = offset as usize;
            let end = start + size as usize;
            data.get(start..end)
                .map(|slice| slice.to_vec())
                .ok_or_else(|| ProtocolError::Parse("address out of range".to_string()))
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn tag(name: &str, block: u16, offset: u32, size: u16, dtype: &str) -> TagSpec {
        TagSpec {
            name: name.to_string(),
            block,
            offset,
            size,
            dtype: dtype.to_string(),
        }
    }

    fn driver_with(blocks: MemoryBlocks, tags: Vec<TagSpec>) -> RegisterDriver<MemoryBlocks> {
        RegisterDriver::new(tags, blocks)
    }

    fn db10() -> Vec<u8> {
        let mut data = vec![0x42, 0x48, 0x00, 0x00];
        data.extend_from_slice(&(-7i16).to_be_bytes());
        data.extend_from_slice(&123_456i32.to_be_bytes());
        data
    }

    #[tokio::test]
    async fn test_read_once_decodes_in_declaration_order() {
        let mut blocks = MemoryBlocks::default();
        blocks.blocks.insert(10, db10());
        let mut driver = driver_with(
            blocks,
            vec![
                tag("total", 10, 6, 4, "DINT"),
                tag("pressure", 10, 0, 4, "REAL"),
                tag("rpm", 10, 4, 2, "int"),
            ],
        );
        driver.connect().await.unwrap();

        let result = driver.read_once().await;
        assert!(result.is_ok());
        let names: Vec<&str> = result.values().names().collect();
        assert_eq!(names, vec!["total", "pressure", "rpm"]);
        assert_eq!(result.values().get("pressure"), Some(50.0));
        assert_eq!(result.values().get("rpm"), Some(-7.0));
        assert_eq!(result.values().get("total"), Some(123_456.0));
    }

    #[tokio::test]
    async fn test_read_once_is_all_or_nothing() {
        let mut blocks = MemoryBlocks::default();
        blocks.blocks.insert(10, db10());
        let mut driver = driver_with(
            blocks,
            vec![
                tag("pressure", 10, 0, 4, "REAL"),
                tag("status", 10, 4, 2, "WORD"),
                tag("total", 10, 6, 4, "DINT"),
            ],
        );
        driver.connect().await.unwrap();

        let result = driver.read_once().await;
        assert!(!result.is_ok());
        assert!(result.values().is_empty());
        let error = result.error().unwrap();
        assert!(error.contains("status"));
        assert!(error.contains("WORD"));
        // 失败标签之后的标签不再读取
        assert_eq!(driver.client.reads, 2);
        assert!(driver.is_connected());
    }

    #[tokio::test]
    async fn test_read_error_names_tag() {
        let mut blocks = MemoryBlocks::default();
        blocks.blocks.insert(10, db10());
        let mut driver = driver_with(blocks, vec![tag("far", 10, 100, 4, "REAL")]);
        driver.connect().await.unwrap();

        let result = driver.read_once().await;
        assert!(result.error().unwrap().contains("far"));
    }

    #[tokio::test]
    async fn test_transport_failure_drops_channel() {
        let blocks = MemoryBlocks {
            fail_io: true,
            ..MemoryBlocks::default()
        };
        let mut driver = driver_with(blocks, vec![tag("pressure", 10, 0, 4, "REAL")]);
        driver.connect().await.unwrap();

        let first = driver.read_once().await;
        assert!(first.error().unwrap().contains("connection reset"));
        assert!(!driver.is_connected());

        let second = driver.read_once().await;
        assert_eq!(second.error(), Some("not connected"));
    }

    #[test]
    fn test_validate_rejects_zero_size_tag() {
        let config = RegisterDriverConfig {
            host: "10.0.0.1".to_string(),
            port: 102,
            rack: 0,
            slot: 1,
            timeout_s: 2.0,
            tags: vec![tag("x", 1, 0, 0, "REAL")],
        };
        assert!(matches!(config.validate(), Err(ProtocolError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_timeout() {
        let config = RegisterDriverConfig {
            host: "10.0.0.1".to_string(),
            port: 102,
            rack: 0,
            slot: 1,
            timeout_s: 1e20,
            tags: vec![tag("x", 1, 0, 4, "REAL")],
        };
        assert!(matches!(config.validate(), Err(ProtocolError::Config(_))));
        assert!(matches!(config.endpoint(), Err(ProtocolError::Config(_))));
    }
}
