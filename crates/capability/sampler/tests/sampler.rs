use async_trait::async_trait;
use domain::{AssetIdentity, FieldValues, ReadResult};
use skc_history::TimeSeriesBuffer;
use skc_protocol::{Driver, ProtocolError};
use skc_sampler::{LinkState, LiveView, Sampler, spawn_connect, spawn_poll_loop};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 按脚本返回结果并记录调用序列的驱动
#[derive(Clone, Default)]
struct ScriptedDriver {
    reads: Arc<Mutex<VecDeque<ReadResult>>>,
    connects: Arc<Mutex<VecDeque<Result<(), String>>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    connected: bool,
    connect_delay: Option<Duration>,
}

impl ScriptedDriver {
    fn with_reads(reads: Vec<ReadResult>) -> Self {
        Self {
            reads: Arc::new(Mutex::new(reads.into())),
            ..Self::default()
        }
    }

    fn push_connect(&self, result: Result<(), String>) {
        self.connects.lock().unwrap().push_back(result);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn connect(&mut self) -> Result<(), ProtocolError> {
        self.calls.lock().unwrap().push("connect");
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.connects.lock().unwrap().pop_front().unwrap_or(Ok(()));
        match scripted {
            Ok(()) => {
                self.connected = true;
                Ok(())
            }
            Err(message) => Err(ProtocolError::Connection(message)),
        }
    }

    async fn close(&mut self) {
        self.calls.lock().unwrap().push("close");
        self.connected = false;
    }

    async fn read_once(&mut self) -> ReadResult {
        self.calls.lock().unwrap().push("read");
        self.reads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ReadResult::success(values(&[("p", 1.0)])))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

fn values(pairs: &[(&str, f64)]) -> FieldValues {
    pairs.iter().map(|(name, value)| (*name, *value)).collect()
}

#[tokio::test]
async fn not_connected_triggers_exactly_one_retry_and_reports_its_error() {
    let driver = ScriptedDriver::with_reads(vec![
        ReadResult::failure("not connected"),
        ReadResult::failure("timed out: no reply within 2s"),
    ]);
    let probe = driver.clone();
    let mut sampler = Sampler::new("J65", driver);

    let result = sampler.tick().await;
    assert!(!result.is_ok());
    assert_eq!(result.error(), Some("timed out: no reply within 2s"));
    assert_eq!(probe.calls(), vec!["read", "close", "connect", "read"]);
}

#[tokio::test]
async fn reconnect_success_returns_retry_values() {
    let driver = ScriptedDriver::with_reads(vec![
        ReadResult::failure("not connected"),
        ReadResult::success(values(&[("p", 7.0)])),
    ]);
    let mut sampler = Sampler::new("J65", driver);

    let result = sampler.tick().await;
    assert_eq!(result.values().get("p"), Some(7.0));
    assert_eq!(sampler.state(), LinkState::Connected);
}

#[tokio::test]
async fn failed_reconnect_surfaces_connect_error() {
    let driver = ScriptedDriver::with_reads(vec![ReadResult::failure("not connected")]);
    driver.push_connect(Err("Connection refused (os error 111)".to_string()));
    let probe = driver.clone();
    let mut sampler = Sampler::new("J65", driver);

    let result = sampler.tick().await;
    assert!(result.error().unwrap().contains("refused"));
    assert_eq!(probe.calls(), vec!["read", "close", "connect"]);
    assert_eq!(sampler.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn other_failures_are_not_retried() {
    let driver = ScriptedDriver::with_reads(vec![ReadResult::failure("bad reply (fields=3): x")]);
    let probe = driver.clone();
    let mut sampler = Sampler::new("J65", driver);

    let result = sampler.tick().await;
    assert_eq!(result.error(), Some("bad reply (fields=3): x"));
    assert_eq!(probe.calls(), vec!["read"]);
}

#[tokio::test]
async fn test_mode_bypasses_driver() {
    let driver = ScriptedDriver::with_reads(vec![ReadResult::failure("not connected")]);
    let probe = driver.clone();
    let mut sampler = Sampler::new("J65", driver);
    sampler.set_test_mode(true);

    let result = sampler.tick().await;
    assert!(result.is_ok());
    let names: Vec<&str> = result.values().names().collect();
    assert_eq!(names, vec!["pressure", "flow", "temp"]);
    assert!(probe.calls().is_empty());

    sampler.set_test_mode(false);
    assert!(!sampler.test_mode());
}

#[tokio::test]
async fn poll_loop_feeds_view_and_returns_driver() {
    let mut driver = ScriptedDriver::default();
    driver.connected = true;
    let view = Arc::new(tokio::sync::Mutex::new(LiveView::new(
        AssetIdentity::new("J65", 7, "A123BC"),
        TimeSeriesBuffer::with_capacity(60),
        PathBuf::from("records"),
    )));

    let handle = spawn_poll_loop(
        Sampler::new("J65", driver),
        Arc::clone(&view),
        Duration::from_millis(10),
    );
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(handle.link_state(), LinkState::Connected);

    let sampler = handle.stop().await.expect("sampler");
    assert!(sampler.driver().is_connected());

    let view = view.lock().await;
    assert!(view.buffer().len("p") >= 2);
    assert_eq!(view.status(), "J65: OK (1 values)");
}

#[tokio::test]
async fn poll_loop_switches_to_test_mode() {
    let view = Arc::new(tokio::sync::Mutex::new(LiveView::new(
        AssetIdentity::new("J65", 7, "A123BC"),
        TimeSeriesBuffer::with_capacity(60),
        PathBuf::from("records"),
    )));
    let handle = spawn_poll_loop(
        Sampler::new("J65", ScriptedDriver::default()),
        Arc::clone(&view),
        Duration::from_millis(10),
    );
    assert!(handle.set_test_mode(true));
    tokio::time::sleep(Duration::from_millis(80)).await;
    let sampler = handle.stop().await.expect("sampler");
    assert!(sampler.test_mode());
    assert!(view.lock().await.buffer().len("pressure") >= 1);
}

#[tokio::test]
async fn background_connect_delivers_driver() {
    let pending = spawn_connect("J65", ScriptedDriver::default());
    let outcome = pending.outcome().await.expect("outcome");
    assert!(outcome.result.is_ok());
    assert!(outcome.driver.is_connected());
}

#[tokio::test]
async fn background_connect_failure_still_returns_driver() {
    let driver = ScriptedDriver::default();
    driver.push_connect(Err("No route to host".to_string()));
    let outcome = spawn_connect("J65", driver).outcome().await.expect("outcome");
    assert!(outcome.result.unwrap_err().contains("No route"));
    assert!(!outcome.driver.is_connected());
}

#[tokio::test]
async fn cancelled_connect_is_not_delivered() {
    let driver = ScriptedDriver {
        connect_delay: Some(Duration::from_millis(50)),
        ..ScriptedDriver::default()
    };
    let probe = driver.clone();
    let pending = spawn_connect("J65", driver);
    pending.canceller().cancel();

    assert!(pending.outcome().await.is_none());
    // 连接本身仍然执行完毕，之后被关闭
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(probe.calls(), vec!["connect", "close"]);
}
