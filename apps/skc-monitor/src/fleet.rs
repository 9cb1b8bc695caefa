//! 资产注册表
//!
//! 每个资产一个槽位：
//! - 停放的驱动（首次使用时按配置构造，之后复用）
//! - 监视任务（轮询循环 + 实时视图），打开期间驱动归轮询任务所有
//! - 进行中的后台连接（取消标记）
//! - 最近一次后台探测结果
//!
//! 加锁顺序固定为先 `driver` 后 `state`；改变监视/连接状态的操作都持有 `driver` 锁，
//! 因此探测持有 `driver` 锁期间看到的状态是稳定的。

use api_contract::AssetDto;
use domain::{AssetIdentity, now_epoch_ms};
use skc_config::{AppConfig, AssetDescriptor};
use skc_diagnostics::OperatorNotice;
use skc_history::{HistoryError, TimeSeriesBuffer};
use skc_protocol::{AnyDriver, Driver, ProtocolError};
use skc_sampler::{
    ConnectCanceller, ConnectOutcome, LinkState, LiveView, PollHandle, Sampler, spawn_connect,
    spawn_poll_loop,
};
use skc_telemetry::{record_connect_failure, record_probe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("{0}: connect already in progress")]
    Busy(String),
    #[error("{0}: view is not open")]
    ViewClosed(String),
    #[error("{asset_id}: {source}")]
    Driver {
        asset_id: String,
        source: ProtocolError,
    },
    #[error("{raw}")]
    Connect {
        notice: Box<OperatorNotice>,
        raw: String,
    },
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// 轮询与缓冲参数（全局统一）
#[derive(Debug, Clone)]
pub struct FleetSettings {
    pub poll_period: Duration,
    pub poll_hz: u32,
    pub history_seconds: u64,
    pub records_dir: PathBuf,
}

impl FleetSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_period: config.poll_period(),
            poll_hz: config.poll_hz,
            history_seconds: config.history_seconds,
            records_dir: config.records_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ProbeStatus {
    online: bool,
    checked_ms: i64,
}

struct Monitor {
    handle: PollHandle<AnyDriver>,
    view: Arc<Mutex<LiveView>>,
    test_mode: bool,
}

struct SlotState {
    link: LinkState,
    monitor: Option<Monitor>,
    connecting: Option<ConnectCanceller>,
    probe: Option<ProbeStatus>,
}

struct AssetSlot {
    descriptor: AssetDescriptor,
    identity: AssetIdentity,
    driver: Mutex<Option<AnyDriver>>,
    state: Mutex<SlotState>,
}

impl AssetSlot {
    fn new(descriptor: AssetDescriptor) -> Self {
        let identity = descriptor.identity();
        Self {
            descriptor,
            identity,
            driver: Mutex::new(None),
            state: Mutex::new(SlotState {
                link: LinkState::Disconnected,
                monitor: None,
                connecting: None,
                probe: None,
            }),
        }
    }

    fn build_driver(&self) -> Result<AnyDriver, FleetError> {
        self.descriptor
            .driver
            .build()
            .map_err(|source| FleetError::Driver {
                asset_id: self.identity.id.clone(),
                source,
            })
    }

    fn connect_failure(&self, raw: String) -> FleetError {
        let notice = OperatorNotice::connect_failure(
            &self.identity,
            self.descriptor.driver.kind(),
            &self.descriptor.driver.address(),
            &raw,
        );
        FleetError::Connect {
            notice: Box::new(notice),
            raw,
        }
    }

    async fn dto(&self) -> AssetDto {
        let state = self.state.lock().await;
        let link = match &state.monitor {
            Some(monitor) => monitor.handle.link_state(),
            None => state.link,
        };
        let monitoring = state.monitor.is_some();
        AssetDto {
            id: self.identity.id.clone(),
            fleet_no: self.identity.fleet_no,
            fleet_label: self.identity.fleet_label(),
            plate: self.identity.plate.clone(),
            driver_type: self.descriptor.driver.kind().to_string(),
            address: self.descriptor.driver.address(),
            link_state: link.as_str().to_string(),
            online: state.probe.filter(|_| !monitoring).map(|probe| probe.online),
            monitoring,
            connecting: state.connecting.is_some(),
            last_probe_ms: state.probe.map(|probe| probe.checked_ms),
        }
    }
}

/// 打开中的视图引用
pub struct ViewRef {
    pub view: Arc<Mutex<LiveView>>,
    pub link_state: LinkState,
    pub test_mode: bool,
}

/// 资产注册表
pub struct Fleet {
    slots: Vec<Arc<AssetSlot>>,
    settings: FleetSettings,
}

impl Fleet {
    /// 按车队编号排序（编号相同保持文件顺序）
    pub fn new(mut assets: Vec<AssetDescriptor>, settings: FleetSettings) -> Self {
        assets.sort_by_key(|asset| asset.fleet_no);
        let slots = assets
            .into_iter()
            .map(|descriptor| Arc::new(AssetSlot::new(descriptor)))
            .collect();
        Self { slots, settings }
    }

    pub fn asset_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, asset_id: &str) -> Result<&Arc<AssetSlot>, FleetError> {
        self.slots
            .iter()
            .find(|slot| slot.identity.id == asset_id)
            .ok_or_else(|| FleetError::NotFound(asset_id.to_string()))
    }

    pub async fn list(&self) -> Vec<AssetDto> {
        let mut assets = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            assets.push(slot.dto().await);
        }
        assets
    }

    /// 显式连接：在后台任务中执行，失败时返回操作员提示
    pub async fn connect(&self, asset_id: &str) -> Result<LinkState, FleetError> {
        let slot = self.slot(asset_id)?;
        let pending = {
            let mut parked = slot.driver.lock().await;
            let mut state = slot.state.lock().await;
            if let Some(monitor) = &state.monitor {
                return Ok(monitor.handle.link_state());
            }
            if state.connecting.is_some() {
                return Err(FleetError::Busy(asset_id.to_string()));
            }
            if parked.as_ref().is_some_and(|driver| driver.is_connected()) {
                state.link = LinkState::Connected;
                return Ok(LinkState::Connected);
            }
            let driver = match parked.take() {
                Some(driver) => driver,
                None => slot.build_driver()?,
            };
            info!(target: "skc.fleet", asset_id, address = %slot.descriptor.driver.address(), "connect_requested");
            let pending = spawn_connect(asset_id, driver);
            state.connecting = Some(pending.canceller());
            state.link = LinkState::Connecting;
            pending
        };

        let canceller = pending.canceller();
        let Some(ConnectOutcome { mut driver, result }) = pending.outcome().await else {
            return Ok(LinkState::Disconnected);
        };

        let mut parked = slot.driver.lock().await;
        let mut state = slot.state.lock().await;
        if canceller.is_cancelled() {
            drop(state);
            driver.close().await;
            return Ok(LinkState::Disconnected);
        }
        state.connecting = None;
        state.link = if result.is_ok() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        *parked = Some(driver);
        drop(state);
        drop(parked);

        match result {
            Ok(()) => {
                info!(target: "skc.fleet", asset_id, "asset_connected");
                Ok(LinkState::Connected)
            }
            Err(raw) => Err(slot.connect_failure(raw)),
        }
    }

    /// 打开实时视图：驱动移交给新的轮询任务
    pub async fn open_view(&self, asset_id: &str) -> Result<LinkState, FleetError> {
        let slot = self.slot(asset_id)?;
        let mut parked = slot.driver.lock().await;
        let mut state = slot.state.lock().await;
        if let Some(monitor) = &state.monitor {
            return Ok(monitor.handle.link_state());
        }
        if state.connecting.is_some() {
            return Err(FleetError::Busy(asset_id.to_string()));
        }

        let driver = match parked.take() {
            Some(driver) => driver,
            None => slot.build_driver()?,
        };
        let buffer =
            TimeSeriesBuffer::for_window(self.settings.history_seconds, self.settings.poll_hz);
        let view = Arc::new(Mutex::new(LiveView::new(
            slot.identity.clone(),
            buffer,
            self.settings.records_dir.clone(),
        )));
        let sampler = Sampler::new(asset_id, driver);
        let link = sampler.state();
        let handle = spawn_poll_loop(sampler, Arc::clone(&view), self.settings.poll_period);
        state.monitor = Some(Monitor {
            handle,
            view,
            test_mode: false,
        });
        info!(target: "skc.fleet", asset_id, "view_opened");
        Ok(link)
    }

    /// 关闭视图：停止轮询，连接保持，驱动停放回槽位
    pub async fn close_view(&self, asset_id: &str) -> Result<(), FleetError> {
        let slot = self.slot(asset_id)?;
        let mut parked = slot.driver.lock().await;
        let monitor = slot.state.lock().await.monitor.take();
        let Some(monitor) = monitor else {
            return Ok(());
        };

        let link = match monitor.handle.stop().await {
            Some(sampler) => {
                let driver = sampler.into_driver();
                let connected = driver.is_connected();
                *parked = Some(driver);
                if connected {
                    LinkState::Connected
                } else {
                    LinkState::Disconnected
                }
            }
            None => {
                warn!(target: "skc.fleet", asset_id, "poll_task_lost");
                LinkState::Disconnected
            }
        };
        slot.state.lock().await.link = link;
        info!(target: "skc.fleet", asset_id, "view_closed");
        Ok(())
    }

    pub async fn view(&self, asset_id: &str) -> Result<ViewRef, FleetError> {
        let slot = self.slot(asset_id)?;
        let state = slot.state.lock().await;
        let monitor = state
            .monitor
            .as_ref()
            .filter(|monitor| !monitor.handle.is_finished())
            .ok_or_else(|| FleetError::ViewClosed(asset_id.to_string()))?;
        Ok(ViewRef {
            view: Arc::clone(&monitor.view),
            link_state: monitor.handle.link_state(),
            test_mode: monitor.test_mode,
        })
    }

    pub async fn set_test_mode(&self, asset_id: &str, enabled: bool) -> Result<(), FleetError> {
        let slot = self.slot(asset_id)?;
        let mut state = slot.state.lock().await;
        let monitor = state
            .monitor
            .as_mut()
            .ok_or_else(|| FleetError::ViewClosed(asset_id.to_string()))?;
        if !monitor.handle.set_test_mode(enabled) {
            return Err(FleetError::ViewClosed(asset_id.to_string()));
        }
        monitor.test_mode = enabled;
        Ok(())
    }

    /// 拆除连接：取消进行中的连接，停止轮询，关闭驱动
    pub async fn teardown(&self, asset_id: &str) -> Result<(), FleetError> {
        let slot = self.slot(asset_id)?;
        let mut parked = slot.driver.lock().await;
        let monitor = {
            let mut state = slot.state.lock().await;
            if let Some(canceller) = state.connecting.take() {
                canceller.cancel();
            }
            state.link = LinkState::Disconnected;
            state.monitor.take()
        };

        if let Some(monitor) = monitor {
            if let Some(mut sampler) = monitor.handle.stop().await {
                sampler.teardown().await;
                *parked = Some(sampler.into_driver());
            }
        }
        if let Some(driver) = parked.as_mut() {
            driver.close().await;
        }
        info!(target: "skc.fleet", asset_id, "connection_torn_down");
        Ok(())
    }

    /// 对所有未打开视图的资产各做一次探测
    pub async fn probe_all(&self) {
        let mut probes = JoinSet::new();
        for slot in &self.slots {
            probes.spawn(probe_slot(Arc::clone(slot)));
        }
        while probes.join_next().await.is_some() {}
    }

    pub async fn shutdown(&self) {
        for slot in &self.slots {
            if let Err(err) = self.teardown(&slot.identity.id).await {
                warn!(target: "skc.fleet", error = %err, "shutdown_teardown_failed");
            }
        }
    }
}

/// 单个资产探测；驱动正被占用（连接、轮询或上一轮探测）时跳过
async fn probe_slot(slot: Arc<AssetSlot>) {
    let Ok(mut parked) = slot.driver.try_lock() else {
        return;
    };
    {
        let state = slot.state.lock().await;
        if state.monitor.is_some() || state.connecting.is_some() {
            return;
        }
    }
    if parked.is_none() {
        match slot.build_driver() {
            Ok(driver) => *parked = Some(driver),
            Err(err) => {
                warn!(target: "skc.fleet", error = %err, "probe_driver_invalid");
                return;
            }
        }
    }
    let Some(driver) = parked.as_mut() else {
        return;
    };

    let outcome = probe_driver(driver).await;
    let connected = driver.is_connected();
    record_probe();
    if let Err(error) = &outcome {
        debug!(target: "skc.fleet", asset_id = %slot.identity.id, error, "probe_failed");
    }

    let mut state = slot.state.lock().await;
    state.link = if connected {
        LinkState::Connected
    } else {
        LinkState::Disconnected
    };
    state.probe = Some(ProbeStatus {
        online: outcome.is_ok(),
        checked_ms: now_epoch_ms(),
    });
}

async fn probe_driver(driver: &mut AnyDriver) -> Result<(), String> {
    if !driver.is_connected() {
        if let Err(err) = driver.connect().await {
            record_connect_failure();
            return Err(err.to_string());
        }
    }
    match driver.read_once().await.error() {
        Some(error) => Err(error.to_string()),
        None => Ok(()),
    }
}

/// 后台状态探测循环
pub fn spawn_status_probe(fleet: Arc<Fleet>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(target: "skc.fleet", assets = fleet.asset_count(), period_ms = period.as_millis() as u64, "status_probe_started");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            fleet.probe_all().await;
        }
    })
}
