//! 行协议设备模拟器
//!
//! 监听 TCP 端口；每收到一次请求口令，回复一行带当前时间戳的 CSV 样本，
//! 样本按连接循环使用。严格一问一答，不主动推送。

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// 样本模板，`{ts}` 替换为当前时间
pub const SAMPLE_TEMPLATES: [&str; 4] = [
    "R2R2PF,J65,{ts},0.001,0.000,0.000,0.000,0.000,22.402,0.010,17.117,15.940,0.000,17.322,0.001,07",
    "R2R2PF,J65,{ts},0.003,0.000,0.000,0.000,0.000,22.725,0.010,17.117,15.940,0.000,17.322,0.001,07",
    "R2R2PF,J65,{ts},0.004,0.000,0.000,0.000,0.000,22.520,0.010,17.117,15.940,0.000,17.322,0.001,07",
    "R2R2PF,J65,{ts},0.001,0.000,0.000,0.000,0.000,22.800,0.010,17.117,15.940,0.000,17.322,0.001,07",
];

/// 单个请求缓冲上限，超过即断开该连接
const MAX_PENDING_REQUEST: usize = 4096;

/// 模拟器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSimulatorConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_hello_token")]
    pub hello_token: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:6565".to_string()
}

fn default_hello_token() -> String {
    "$HELLO".to_string()
}

impl Default for LineSimulatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            hello_token: default_hello_token(),
        }
    }
}

/// 行协议设备模拟器
pub struct LineSimulator {
    listener: TcpListener,
    hello_token: String,
}

impl LineSimulator {
    pub async fn bind(config: LineSimulatorConfig) -> Result<Self, ProtocolError> {
        if config.hello_token.is_empty() {
            return Err(ProtocolError::Config("simulator: empty hello_token".to_string()));
        }
        let listener = TcpListener::bind(config.listen_addr.as_str()).await?;
        Ok(Self {
            listener,
            hello_token: config.hello_token,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        Ok(self.listener.local_addr()?)
    }

    /// 接受连接，每个连接一个任务；不会主动返回
    pub async fn run(self) -> Result<(), ProtocolError> {
        info!(target: "skc.protocol", addr = ?self.listener.local_addr().ok(), "line simulator listening");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!(target: "skc.protocol", %peer, "simulator client connected");
                    let token = self.hello_token.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve_client(stream, token).await {
                            warn!(target: "skc.protocol", %peer, error = %err, "simulator client error");
                        }
                        info!(target: "skc.protocol", %peer, "simulator client closed");
                    });
                }
                Err(err) => {
                    error!(target: "skc.protocol", error = %err, "simulator accept failed");
                }
            }
        }
    }
}

async fn serve_client(mut stream: TcpStream, token: String) -> Result<(), ProtocolError> {
    let token = token.into_bytes();
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];
    let mut cursor = 0usize;

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        pending.extend_from_slice(&chunk[..n]);

        while let Some(pos) = find(&pending, &token) {
            pending.drain(..pos + token.len());
            let line = render_sample(cursor);
            cursor = cursor.wrapping_add(1);
            debug!(target: "skc.protocol", line = %line.trim_end(), "simulator tx");
            stream.write_all(line.as_bytes()).await?;
        }

        if pending.len() > MAX_PENDING_REQUEST {
            return Err(ProtocolError::Parse(format!(
                "no request token within {MAX_PENDING_REQUEST} bytes"
            )));
        }
    }
}

/// 第 `index` 条样本（CRLF 结尾）
pub fn render_sample(index: usize) -> String {
    let template = SAMPLE_TEMPLATES[index % SAMPLE_TEMPLATES.len()];
    let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    format!("{}\r\n", template.replace("{ts}", &ts))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
