//! 协议错误类型定义

/// 协议通信错误
///
/// 驱动内部使用；跨过 `read_once` 边界时统一转换为失败的 `ReadResult` 文本。
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 超时错误（文本必须包含 "timed out"，供故障分类使用）
    #[error("timed out: {0}")]
    Timeout(String),

    /// 通道尚未建立或已被关闭
    #[error("not connected")]
    NotConnected,

    /// 对端在行结束符之前关闭连接
    #[error("remote closed connection")]
    Disconnected,

    /// 接收缓冲超过上限仍未找到行结束符
    #[error("rx buffer overflow: no line terminator within {0} bytes")]
    BufferOverflow(usize),

    /// 应答格式错误
    #[error("{0}")]
    Parse(String),

    /// 数值解码错误
    #[error("tag '{tag}': {message}")]
    Decode { tag: String, message: String },

    /// PLC 返回错误或报文不合法
    #[error("plc error: {0}")]
    Plc(String),

    /// 配置错误（构造驱动时立即报告）
    #[error("config error: {0}")]
    Config(String),
}

impl ProtocolError {
    /// 该错误之后通道状态不可信，需要丢弃连接。
    ///
    /// 解析/解码错误不影响字节流同步，保留连接。
    pub fn breaks_channel(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::Timeout(_)
                | ProtocolError::Disconnected
                | ProtocolError::BufferOverflow(_)
                | ProtocolError::Plc(_)
        )
    }
}
