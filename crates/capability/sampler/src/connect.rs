use skc_protocol::Driver;
use skc_telemetry::record_connect_failure;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;
use tracing::{info, warn};

/// 后台连接的结果；无论成败都交还驱动
pub struct ConnectOutcome<D> {
    pub driver: D,
    pub result: Result<(), String>,
}

/// 取消标记：只抑制结果交付，不中断进行中的连接
#[derive(Debug, Clone)]
pub struct ConnectCanceller {
    cancelled: Arc<AtomicBool>,
}

impl ConnectCanceller {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// 进行中的后台连接
pub struct PendingConnect<D> {
    asset_id: String,
    canceller: ConnectCanceller,
    receiver: oneshot::Receiver<ConnectOutcome<D>>,
}

impl<D: Driver + 'static> PendingConnect<D> {
    pub fn canceller(&self) -> ConnectCanceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// 等待结果；已取消时返回 None，驱动被关闭并丢弃
    pub async fn outcome(self) -> Option<ConnectOutcome<D>> {
        let mut outcome = self.receiver.await.ok()?;
        if self.canceller.is_cancelled() {
            outcome.driver.close().await;
            info!(target: "skc.sampler", asset_id = %self.asset_id, "connect_cancelled");
            return None;
        }
        Some(outcome)
    }
}

/// 在后台任务中执行 `connect()`，驱动所有权随任务转移
pub fn spawn_connect<D>(asset_id: impl Into<String>, mut driver: D) -> PendingConnect<D>
where
    D: Driver + 'static,
{
    let asset_id = asset_id.into();
    let canceller = ConnectCanceller {
        cancelled: Arc::new(AtomicBool::new(false)),
    };
    let (sender, receiver) = oneshot::channel();

    let task_canceller = canceller.clone();
    let task_asset_id = asset_id.clone();
    tokio::spawn(async move {
        let result = driver.connect().await.map_err(|err| err.to_string());
        if let Err(error) = &result {
            record_connect_failure();
            warn!(target: "skc.sampler", asset_id = %task_asset_id, error = %error, "connect_failed");
        }

        if task_canceller.is_cancelled() {
            driver.close().await;
            info!(target: "skc.sampler", asset_id = %task_asset_id, ok = result.is_ok(), "connect_cancelled");
            return;
        }
        if let Err(mut undelivered) = sender.send(ConnectOutcome { driver, result }) {
            undelivered.driver.close().await;
        }
    });

    PendingConnect {
        asset_id,
        canceller,
        receiver,
    }
}
