//! Modbus TCP relay entry point

use anyhow::Result;
use clap::Parser;
use mbrelay::{ProtocolBridge, RelayConfig, Scheduler};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll one Modbus TCP controller for input registers and relay the raw
/// response to another
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller polled for input registers
    #[arg(long, default_value = "192.168.1.37:502")]
    source: SocketAddr,

    /// Controller the response is relayed to
    #[arg(long, default_value = "192.168.1.36:502")]
    target: SocketAddr,

    /// Modbus unit identifier of the polled controller
    #[arg(long, default_value_t = 10)]
    unit_id: u8,

    /// First input register to read
    #[arg(long, default_value_t = 0)]
    start_register: u16,

    /// Number of input registers to read (1-125)
    #[arg(long, default_value_t = 20)]
    register_count: u16,

    /// Interval between relay cycles in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,

    /// Extra wait after a cycle with a link down, in milliseconds
    #[arg(long, default_value_t = 1000)]
    backoff_ms: u64,

    /// Wait after a fresh connection before the first request, in milliseconds
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,

    /// Readiness wait per empty receive attempt in milliseconds
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,

    /// Receive attempts per response
    #[arg(long, default_value_t = 10)]
    read_attempts: u32,
}

impl Args {
    fn into_config(self) -> Result<RelayConfig> {
        let config = RelayConfig::builder()
            .source(self.source)
            .target(self.target)
            .unit_id(self.unit_id)
            .start_register(self.start_register)
            .register_count(self.register_count)
            .tick_interval(Duration::from_millis(self.tick_ms))
            .reconnect_backoff(Duration::from_millis(self.backoff_ms))
            .settle_delay(Duration::from_millis(self.settle_ms))
            .poll_interval(Duration::from_millis(self.poll_ms))
            .read_attempts(self.read_attempts)
            .build()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let config = Args::parse().into_config()?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Interrupt received, shutting down"),
            Err(e) => log::error!("Failed to listen for interrupt: {}", e),
        }
        signal_token.cancel();
    });

    let bridge = ProtocolBridge::from_config(&config);
    Scheduler::new(bridge, config.timing(), shutdown).run().await;

    Ok(())
}
