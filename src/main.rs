//! Dependency guard service.
//!
//! Runs the resilience envelope for a set of configured dependencies:
//! probes them, keeps one circuit per identity, and exposes circuit state
//! over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML) ──▶ catalog ──▶ DependencyGuard ──▶ Envelope ──▶ dependency
//!        ▲                            │      ▲            │
//!        │ watcher                    │      │ monitor    ▼
//!        │                            ▼      │        registry (circuits)
//!   file change                  status server ◀──────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use dependency_guard::config::{load_config, GuardConfig};
use dependency_guard::lifecycle::{signals, start, Shutdown};
use dependency_guard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "dependency-guard")]
#[command(about = "Resilience envelope for outbound dependency calls", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long, env = "GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "dependency-guard starting"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address.
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let running = start(&config, cli.config.as_deref(), &shutdown).await?;

    if let Some(addr) = running.admin_address {
        tracing::info!(address = %addr, "Status endpoints available");
    }

    signals::wait_for_signal().await;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();
    running.join().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
