//! # 协议通信能力模块
//!
//! 现场设备驱动，统一实现 [`Driver`] 能力接口：
//! - **寄存器驱动**：经 ISO-on-TCP / S7 读取 PLC 数据块，按标签解码
//! - **行协议驱动**：发送请求口令，读取一行 ASCII CSV 应答
//!
//! ## 架构设计
//!
//! ```text
//! 资产配置 (type + 协议参数)
//!       │
//!       ▼
//! DriverSpec::build()  ── 配置错误在此立即报告
//!       │
//!       ├── RegisterDriver<S7Client>
//!       └── LineDriver (LineReader + LineParser)
//!       │
//!       ▼
//! read_once() -> ReadResult  (从不向外抛错)
//! ```
//!
//! ## 配置格式
//!
//! ### 寄存器
//! ```json
//! { "type": "register", "host": "192.168.1.10", "rack": 0, "slot": 1,
//!   "tags": { "pressure": { "db": 10, "start": 0, "size": 4, "dtype": "REAL" } } }
//! ```
//!
//! ### 行协议
//! ```json
//! { "type": "line", "host": "192.168.1.50", "port": 6565, "parser": "numeric_scan" }
//! ```

mod driver;
mod error;
mod framing;
mod line;
mod parse;
mod register;
mod s7;
mod simulator;
mod types;

pub use driver::{AnyDriver, Driver, DriverSpec};
pub use error::ProtocolError;
pub use framing::{LineFraming, LineReader, MAX_BUFFERED_LINE, MAX_SINGLE_BYTE_LINE};
pub use line::{HelloTerminator, LineDriver, LineDriverConfig};
pub use parse::{LineParser, POSITIONAL_CHANNELS, POSITIONAL_MIN_FIELDS};
pub use register::{BlockReader, RegisterDriver, RegisterDriverConfig};
pub use s7::{S7Client, S7Endpoint};
pub use simulator::{render_sample, LineSimulator, LineSimulatorConfig, SAMPLE_TEMPLATES};
pub use types::{decode_tag, DataType, TagAddress, TagSpec};
