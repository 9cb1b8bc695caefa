//! 驱动契约与协议变体
//!
//! 每个协议实现同一个 [`Driver`] 能力接口；调度器只依赖该接口，
//! 新增协议只需新增 [`AnyDriver`] / [`DriverSpec`] 变体。

use crate::error::ProtocolError;
use crate::line::{LineDriver, LineDriverConfig};
use crate::register::{RegisterDriver, RegisterDriverConfig};
use crate::s7::S7Client;
use async_trait::async_trait;
use domain::ReadResult;
use serde::Deserialize;

/// 设备驱动能力接口
#[async_trait]
pub trait Driver: Send {
    /// 建立通道；`close()` 之后可再次调用
    async fn connect(&mut self) -> Result<(), ProtocolError>;

    /// 释放通道；幂等，未连接时调用也安全
    async fn close(&mut self);

    /// 执行恰好一次协议交互，任何内部故障都转换为失败结果
    async fn read_once(&mut self) -> ReadResult;

    /// 控制命令（默认不支持）
    async fn write_command(&mut self, _name: &str, _value: f64) -> bool {
        false
    }

    fn is_connected(&self) -> bool;
}

/// 资产配置中的协议参数（按 `type` 字段区分）
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverSpec {
    /// PLC 寄存器协议
    #[serde(alias = "siemens_s7")]
    Register(RegisterDriverConfig),
    /// ASCII 行协议
    #[serde(alias = "serva_tcp")]
    Line(LineDriverConfig),
}

impl DriverSpec {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            DriverSpec::Register(config) => config.validate(),
            DriverSpec::Line(config) => config.validate(),
        }
    }

    /// 校验参数并构造驱动（不建立连接）
    pub fn build(&self) -> Result<AnyDriver, ProtocolError> {
        self.validate()?;
        match self {
            DriverSpec::Register(config) => {
                let client = S7Client::new(config.endpoint()?);
                Ok(AnyDriver::Register(RegisterDriver::new(
                    config.tags.clone(),
                    client,
                )))
            }
            DriverSpec::Line(config) => Ok(AnyDriver::Line(LineDriver::new(config.clone())?)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DriverSpec::Register(_) => "register",
            DriverSpec::Line(_) => "line",
        }
    }

    /// `host:port` 形式的网络地址
    pub fn address(&self) -> String {
        match self {
            DriverSpec::Register(config) => format!("{}:{}", config.host, config.port),
            DriverSpec::Line(config) => format!("{}:{}", config.host, config.port),
        }
    }
}

/// 封闭的驱动变体集合
pub enum AnyDriver {
    Register(RegisterDriver<S7Client>),
    Line(LineDriver),
}

#[async_trait]
impl Driver for AnyDriver {
    async fn connect(&mut self) -> Result<(), ProtocolError> {
        match self {
            AnyDriver::Register(driver) => driver.connect().await,
            AnyDriver::Line(driver) => driver.connect().await,
        }
    }

    async fn close(&mut self) {
        match self {
            AnyDriver::Register(driver) => driver.close().await,
            AnyDriver::Line(driver) => driver.close().await,
        }
    }

    async fn read_once(&mut self) -> ReadResult {
        match self {
            AnyDriver::Register(driver) => driver.read_once().await,
            AnyDriver::Line(driver) => driver.read_once().await,
        }
    }

    async fn write_command(&mut self, name: &str, value: f64) -> bool {
        match self {
            AnyDriver::Register(driver) => driver.write_command(name, value).await,
            AnyDriver::Line(driver) => driver.write_command(name, value).await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            AnyDriver::Register(driver) => driver.is_connected(),
            AnyDriver::Line(driver) => driver.is_connected(),
        }
    }
}
