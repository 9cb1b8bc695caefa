//! # 采集调度
//!
//! - [`Sampler`]：独占驱动的状态机，一次 tick 一次读取，"not connected" 时重连一次
//! - [`LiveView`]：曲线缓冲 + 录制会话 + 状态行
//! - [`spawn_poll_loop`]：每个资产一个轮询任务
//! - [`spawn_connect`]：后台连接，可取消交付
//!
//! ```text
//! DriverSpec::build ──► spawn_connect ──► ConnectOutcome ──► Sampler ──► spawn_poll_loop
//!                        (连接任务持有驱动)                 (轮询任务持有驱动)
//! ```

mod connect;
mod poll;
mod sampler;
mod synthetic;
mod view;

pub use connect::{ConnectCanceller, ConnectOutcome, PendingConnect, spawn_connect};
pub use poll::{PollCommand, PollHandle, spawn_poll_loop};
pub use sampler::{LinkState, Sampler};
pub use synthetic::{SyntheticSource, synthetic_values};
pub use view::LiveView;
