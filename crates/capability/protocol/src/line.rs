//! ASCII 行协议驱动
//!
//! 每次读取：发送请求口令，读取恰好一行应答，解析为数值字段。
//! 同一连接上最多只有一个未完成的交互，接收缓冲为驱动私有。
//!
//! ## 配置示例
//!
//! ```json
//! {
//!   "type": "line",
//!   "host": "192.168.1.50",
//!   "port": 6565,
//!   "hello_token": "$HELLO",
//!   "hello_terminator": "none",
//!   "framing": "crlf",
//!   "parser": "positional"
//! }
//! ```

use crate::driver::Driver;
use crate::error::ProtocolError;
use crate::framing::{LineFraming, LineReader};
use crate::parse::{LineParser, POSITIONAL_CHANNELS};
use crate::types::timeout_from_secs;
use async_trait::async_trait;
use domain::{FieldValues, ReadResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// 请求口令之后追加的结束符
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelloTerminator {
    #[default]
    None,
    Crlf,
    Lf,
}

impl HelloTerminator {
    fn bytes(self) -> &'static [u8] {
        match self {
            HelloTerminator::None => b"",
            HelloTerminator::Crlf => b"\r\n",
            HelloTerminator::Lf => b"\n",
        }
    }
}

/// 行协议驱动配置
#[derive(Debug, Clone, Deserialize)]
pub struct LineDriverConfig {
    #[serde(alias = "ip")]
    pub host: String,
    #[serde(default = "default_line_port")]
    pub port: u16,
    /// 连接与单次交互超时（秒）
    #[serde(default = "default_timeout_s")]
    pub timeout_s: f64,
    #[serde(default = "default_hello_token")]
    pub hello_token: String,
    #[serde(default)]
    pub hello_terminator: HelloTerminator,
    #[serde(default)]
    pub framing: LineFraming,
    #[serde(default)]
    pub parser: LineParser,
    /// 通道名称；为空时生成 `field_01..`
    #[serde(default)]
    pub field_names: Vec<String>,
}

fn default_line_port() -> u16 {
    6565
}

fn default_timeout_s() -> f64 {
    2.0
}

fn default_hello_token() -> String {
    "$HELLO".to_string()
}

impl LineDriverConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout_s: default_timeout_s(),
            hello_token: default_hello_token(),
            hello_terminator: HelloTerminator::default(),
            framing: LineFraming::default(),
            parser: LineParser::default(),
            field_names: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.host.trim().is_empty() {
            return Err(ProtocolError::Config("line driver: empty host".to_string()));
        }
        if self.port == 0 {
            return Err(ProtocolError::Config("line driver: port must be > 0".to_string()));
        }
        self.timeout()?;
        if self.hello_token.is_empty() {
            return Err(ProtocolError::Config("line driver: empty hello_token".to_string()));
        }
        if self.parser == LineParser::Positional
            && !self.field_names.is_empty()
            && self.field_names.len() != POSITIONAL_CHANNELS
        {
            return Err(ProtocolError::Config(format!(
                "line driver: positional parser needs {} field_names, got {}",
                POSITIONAL_CHANNELS,
                self.field_names.len()
            )));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 连接与单次交互超时
    pub fn timeout(&self) -> Result<Duration, ProtocolError> {
        timeout_from_secs("line driver", self.timeout_s)
    }

    fn request(&self) -> Vec<u8> {
        let mut request = self.hello_token.as_bytes().to_vec();
        request.extend_from_slice(self.hello_terminator.bytes());
        request
    }
}

/// 行协议驱动
pub struct LineDriver {
    config: LineDriverConfig,
    timeout: Duration,
    stream: Option<TcpStream>,
    reader: LineReader,
}

impl LineDriver {
    /// 校验配置并构造（不建立连接）
    pub fn new(config: LineDriverConfig) -> Result<Self, ProtocolError> {
        config.validate()?;
        let timeout = config.timeout()?;
        let reader = LineReader::new(config.framing);
        Ok(Self {
            config,
            timeout,
            stream: None,
            reader,
        })
    }

    pub fn config(&self) -> &LineDriverConfig {
        &self.config
    }

    fn drop_channel(&mut self) {
        self.stream = None;
        self.reader.clear();
    }
}

async fn exchange(
    stream: &mut TcpStream,
    reader: &mut LineReader,
    config: &LineDriverConfig,
) -> Result<FieldValues, ProtocolError> {
    stream.write_all(&config.request()).await?;
    stream.flush().await?;

    let line = reader.read_line(stream).await?;
    let line = line.trim();
    debug!(target: "skc.protocol", address = %config.address(), line, "rx line");
    if line.is_empty() {
        return Err(ProtocolError::Parse("empty reply".to_string()));
    }
    config.parser.parse(line, &config.field_names)
}

#[async_trait]
impl Driver for LineDriver {
    async fn connect(&mut self) -> Result<(), ProtocolError> {
        self.drop_channel();
        let addr = self.config.address();
        let stream = match timeout(self.timeout, TcpStream::connect(addr.as_str())).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(ProtocolError::Connection(format!("{addr}: {err}"))),
            Err(_) => {
                return Err(ProtocolError::Timeout(format!(
                    "connect to {addr} after {}s",
                    self.config.timeout_s
                )))
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            warn!(target: "skc.protocol", address = %addr, error = %err, "set_nodelay failed");
        }
        info!(target: "skc.protocol", address = %addr, "line channel connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            info!(target: "skc.protocol", address = %self.config.address(), "line channel closed");
        }
        self.reader.clear();
    }

    async fn read_once(&mut self) -> ReadResult {
        let Some(stream) = self.stream.as_mut() else {
            return ReadResult::failure(ProtocolError::NotConnected.to_string());
        };

        let outcome = match timeout(self.timeout, exchange(stream, &mut self.reader, &self.config)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ProtocolError::Timeout(format!(
                "no reply within {}s",
                self.config.timeout_s
            ))),
        };

        match outcome {
            Ok(values) => ReadResult::success(values),
            Err(err) => {
                if err.breaks_channel() {
                    warn!(
                        target: "skc.protocol",
                        address = %self.config.address(),
                        error = %err,
                        "line channel dropped"
                    );
                    self.drop_channel();
                }
                ReadResult::failure(err.to_string())
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: LineDriverConfig = serde_json::from_str(r#"{"ip": "10.0.0.7"}"#).unwrap();
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 6565);
        assert_eq!(config.timeout_s, 2.0);
        assert_eq!(config.request(), b"$HELLO".to_vec());
        assert_eq!(config.framing, LineFraming::Crlf);
        assert_eq!(config.parser, LineParser::Positional);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_with_terminator() {
        let mut config = LineDriverConfig::new("127.0.0.1", 6565);
        config.hello_terminator = HelloTerminator::Crlf;
        assert_eq!(config.request(), b"$HELLO\r\n".to_vec());
    }

    #[test]
    fn test_validate_positional_field_names() {
        let mut config = LineDriverConfig::new("127.0.0.1", 6565);
        config.field_names = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(config.validate(), Err(ProtocolError::Config(_))));

        config.parser = LineParser::NumericScan;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_timeout() {
        for timeout_s in [1e20, f64::INFINITY, f64::NAN, 0.0, -1.0, 1e-12] {
            let mut config = LineDriverConfig::new("127.0.0.1", 6565);
            config.timeout_s = timeout_s;
            assert!(
                matches!(config.validate(), Err(ProtocolError::Config(_))),
                "timeout_s {timeout_s} accepted"
            );
            assert!(LineDriver::new(config).is_err());
        }
    }

    #[test]
    fn test_driver_keeps_validated_timeout() {
        let mut config = LineDriverConfig::new("127.0.0.1", 6565);
        config.timeout_s = 0.25;
        let driver = LineDriver::new(config).unwrap();
        assert_eq!(driver.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = LineDriverConfig::new("127.0.0.1", 0);
        assert!(config.validate().is_err());
    }
}
