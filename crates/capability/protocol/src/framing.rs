//! 行分帧
//!
//! 两种可配置策略（不自动探测）：
//! - `crlf`：块读入私有接收缓冲，查找 `\r\n`；结束符之后的字节留给下一次调用。
//!   缓冲达到 1 MiB 仍无结束符即失败，内存占用不超过该上限。
//! - `single_byte`：逐字节读取，遇到 `\n` 或满 64 KiB 停止，去掉行尾空白；
//!   `\n` 之前对端关闭即失败。

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

/// `crlf` 策略的接收缓冲上限
pub const MAX_BUFFERED_LINE: usize = 1024 * 1024;
/// `single_byte` 策略的单行上限
pub const MAX_SINGLE_BYTE_LINE: usize = 64 * 1024;
const READ_CHUNK: usize = 4096;
const CRLF: &[u8] = b"\r\n";

/// 分帧策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFraming {
    /// 以 `\r\n` 为界，块读取
    #[default]
    Crlf,
    /// 逐字节读取，以 `\n` 为界
    SingleByte,
}

/// 行读取器，持有驱动私有的接收缓冲
#[derive(Debug)]
pub struct LineReader {
    framing: LineFraming,
    rx: Vec<u8>,
}

impl LineReader {
    pub fn new(framing: LineFraming) -> Self {
        Self {
            framing,
            rx: Vec::new(),
        }
    }

    /// 丢弃残留字节（重新连接时调用）
    pub fn clear(&mut self) {
        self.rx.clear();
        self.rx.shrink_to_fit();
    }

    /// 当前缓冲的字节数
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    /// 读取一行（不含结束符）
    pub async fn read_line<R>(&mut self, reader: &mut R) -> Result<String, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        match self.framing {
            LineFraming::Crlf => self.read_crlf(reader).await,
            LineFraming::SingleByte => read_single_byte(reader).await,
        }
    }

    async fn read_crlf<R>(&mut self, reader: &mut R) -> Result<String, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let mut searched = 0;
        loop {
            if let Some(pos) = find_crlf(&self.rx[searched..]) {
                let end = searched + pos;
                let line = ascii_text(&self.rx[..end]);
                self.rx.drain(..end + CRLF.len());
                return Ok(line);
            }
            // 结束符可能跨越两次读取
            searched = self.rx.len().saturating_sub(1);

            if self.rx.len() >= MAX_BUFFERED_LINE {
                self.clear();
                return Err(ProtocolError::BufferOverflow(MAX_BUFFERED_LINE));
            }

            let start = self.rx.len();
            let room = (MAX_BUFFERED_LINE - start).min(READ_CHUNK);
            self.rx.resize(start + room, 0);
            let read = reader.read(&mut self.rx[start..]).await;
            let n = match read {
                Ok(n) => n,
                Err(err) => {
                    self.rx.truncate(start);
                    return Err(ProtocolError::Io(err));
                }
            };
            self.rx.truncate(start + n);
            if n == 0 {
                return Err(ProtocolError::Disconnected);
            }
        }
    }
}

async fn read_single_byte<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    while line.len() < MAX_SINGLE_BYTE_LINE {
        let n = reader.read(&mut byte).await?;
        // 对端在 `\n` 之前关闭：半行不作为应答
        if n == 0 {
            return Err(ProtocolError::Disconnected);
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    Ok(ascii_text(&line).trim_end().to_string())
}

fn find_crlf(haystack: &[u8]) -> Option<usize> {
    haystack.windows(CRLF.len()).position(|window| window == CRLF)
}

/// 仅保留 ASCII 字节
fn ascii_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|byte| byte.is_ascii())
        .map(|&byte| byte as char)
        .collect()
}
