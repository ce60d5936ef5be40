//! Resilient Proxy
//!
//! Shields callers of an unreliable upstream behind rate limiting, retries
//! and a circuit breaker, with an optional queue-backed async path.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!   GET /proxy       │  ┌────────────┐    ┌─────────────────────────────┐   │
//!  ──────────────────┼─▶│ sync       │───▶│ ResilientClient             │   │
//!                    │  │ handler    │    │  breaker → retry → limiter  │───┼──▶ Upstream
//!                    │  └────────────┘    └──────────────▲──────────────┘   │
//!                    │                                   │                  │
//!   POST /async-proxy│  ┌────────────┐    ┌───────┐    ┌─┴─────────────┐    │
//!  ──────────────────┼─▶│ async      │───▶│ Queue │───▶│ ConsumerPool  │    │
//!                    │  │ handler    │    └───────┘    └─┬─────────────┘    │
//!                    │  └─────┬──────┘                   │                  │
//!                    │        │  queued      ┌───────────▼──┐               │
//!                    │        └─────────────▶│ StatusStore  │◀── GET        │
//!                    │                       └──────────────┘  /requests/id │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use resilient_proxy::config::{load_config, ProxyConfig};
use resilient_proxy::lifecycle::{startup, wait_for_signal, Shutdown};
use resilient_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "resilient-proxy", version)]
#[command(about = "Resilient proxy for an unreliable upstream", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("resilient-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.target,
        workers = config.consumer.workers,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    startup::run(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
