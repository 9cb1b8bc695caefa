//! 行协议设备模拟器：本地调试用的假现场设备。
//!
//! 环境变量：`SKC_SIM_LISTEN`（默认 0.0.0.0:6565）、`SKC_SIM_TOKEN`（默认 `$HELLO`）。

use skc_protocol::{LineSimulator, LineSimulatorConfig};
use skc_telemetry::init_tracing;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut config = LineSimulatorConfig::default();
    if let Some(listen_addr) = env::var("SKC_SIM_LISTEN").ok().filter(|value| !value.is_empty()) {
        config.listen_addr = listen_addr;
    }
    if let Some(token) = env::var("SKC_SIM_TOKEN").ok().filter(|value| !value.is_empty()) {
        config.hello_token = token;
    }

    let simulator = LineSimulator::bind(config).await?;
    tokio::select! {
        result = simulator.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!(target: "skc.protocol", "line simulator stopped"),
    }
    Ok(())
}
