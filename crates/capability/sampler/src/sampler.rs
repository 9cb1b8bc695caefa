use crate::synthetic::SyntheticSource;
use domain::ReadResult;
use skc_diagnostics::is_not_connected;
use skc_protocol::Driver;
use skc_telemetry::{record_read, record_reconnect};
use tracing::{info, warn};

/// 单个资产的链路状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Reading,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Reading => "reading",
        }
    }
}

/// 轮询调度器：独占一个驱动，每次 tick 恰好执行一次读取。
///
/// 读取失败且错误为 "not connected" 时，执行一次 close / connect / 重读；
/// 重读（或连接）的错误即为本次 tick 的结果，不再重试。
pub struct Sampler<D> {
    asset_id: String,
    driver: D,
    state: LinkState,
    synthetic: Option<SyntheticSource>,
}

impl<D: Driver> Sampler<D> {
    pub fn new(asset_id: impl Into<String>, driver: D) -> Self {
        let state = if driver.is_connected() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        Self {
            asset_id: asset_id.into(),
            driver,
            state,
            synthetic: None,
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// 交还驱动（停止轮询时）
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// 开启时重置测试时间原点
    pub fn set_test_mode(&mut self, enabled: bool) {
        self.synthetic = enabled.then(SyntheticSource::start_now);
        info!(target: "skc.sampler", asset_id = %self.asset_id, enabled, "test_mode_changed");
    }

    pub fn test_mode(&self) -> bool {
        self.synthetic.is_some()
    }

    pub async fn tick(&mut self) -> ReadResult {
        if let Some(source) = &self.synthetic {
            return source.read();
        }

        self.state = LinkState::Reading;
        let first = self.driver.read_once().await;
        let result = if first.error().is_some_and(is_not_connected) {
            self.reconnect_and_retry().await
        } else {
            first
        };
        self.settle();
        record_read(result.is_ok());
        result
    }

    async fn reconnect_and_retry(&mut self) -> ReadResult {
        self.state = LinkState::Disconnected;
        self.driver.close().await;

        self.state = LinkState::Connecting;
        info!(target: "skc.sampler", asset_id = %self.asset_id, "reconnect_attempt");
        if let Err(err) = self.driver.connect().await {
            record_reconnect(false);
            warn!(target: "skc.sampler", asset_id = %self.asset_id, error = %err, "reconnect_failed");
            self.state = LinkState::Disconnected;
            return ReadResult::failure(err.to_string());
        }
        record_reconnect(true);

        self.state = LinkState::Reading;
        self.driver.read_once().await
    }

    fn settle(&mut self) {
        self.state = if self.driver.is_connected() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
    }

    /// 显式拆除连接
    pub async fn teardown(&mut self) {
        self.driver.close().await;
        self.state = LinkState::Disconnected;
    }
}
