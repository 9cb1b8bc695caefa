use crate::sampler::{LinkState, Sampler};
use crate::view::LiveView;
use domain::now_epoch_secs;
use skc_protocol::Driver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// 发往轮询任务的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCommand {
    SetTestMode(bool),
    Stop,
}

/// 正在运行的轮询任务。停止后交还 [`Sampler`]（连同驱动）。
pub struct PollHandle<D> {
    commands: mpsc::UnboundedSender<PollCommand>,
    state: watch::Receiver<LinkState>,
    task: JoinHandle<Sampler<D>>,
}

impl<D> PollHandle<D> {
    pub fn set_test_mode(&self, enabled: bool) -> bool {
        self.commands.send(PollCommand::SetTestMode(enabled)).is_ok()
    }

    /// 最近一次 tick 之后的链路状态
    pub fn link_state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待当前 tick 完成后停止，交还调度器
    pub async fn stop(self) -> Option<Sampler<D>> {
        let _ = self.commands.send(PollCommand::Stop);
        self.task.await.ok()
    }
}

/// 每个资产一个任务：按固定周期 tick，结果写入视图。
///
/// 上一次 tick 完成前不会开始下一次；慢设备只影响自己的任务。
pub fn spawn_poll_loop<D>(
    mut sampler: Sampler<D>,
    view: Arc<Mutex<LiveView>>,
    period: Duration,
) -> PollHandle<D>
where
    D: Driver + 'static,
{
    let (commands, mut receiver) = mpsc::unbounded_channel();
    let (state_tx, state) = watch::channel(sampler.state());

    let task = tokio::spawn(async move {
        let asset_id = sampler.asset_id().to_string();
        info!(target: "skc.sampler", asset_id = %asset_id, period_ms = period.as_millis() as u64, "poll_loop_started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                command = receiver.recv() => match command {
                    Some(PollCommand::SetTestMode(enabled)) => sampler.set_test_mode(enabled),
                    Some(PollCommand::Stop) | None => break,
                },
                _ = ticker.tick() => {
                    let result = sampler.tick().await;
                    let timestamp = now_epoch_secs();
                    if let Some(error) = result.error() {
                        debug!(target: "skc.sampler", asset_id = %asset_id, error, "tick_failed");
                    }
                    view.lock().await.apply(timestamp, &result);
                    let _ = state_tx.send(sampler.state());
                }
            }
        }

        info!(target: "skc.sampler", asset_id = %asset_id, "poll_loop_stopped");
        sampler
    });

    PollHandle {
        commands,
        state,
        task,
    }
}
