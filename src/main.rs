//! Backend guard service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Application call
//!     ─────────────────▶ retry ─▶ circuit breaker ─▶ deadline ─▶ Backend
//!                           │            │                          ▲
//!                           │            │ state changes            │ GET /health
//!                           ▼            ▼                          │
//!                     ┌──────────────────────────┐          ┌──────────────┐
//!                     │    status aggregator     │◀─────────│ health probe │
//!                     │ health, circuit, banner  │  results │  (periodic)  │
//!                     └────────────┬─────────────┘          └──────────────┘
//!                                  │
//!                                  ▼
//!                         admin API / metrics
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use backend_guard::admin::{serve_admin, AdminState};
use backend_guard::config::{load_config, GuardConfig};
use backend_guard::lifecycle::{signals, GuardContext, Shutdown};
use backend_guard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "backend-guard")]
#[command(about = "Circuit breaker, health probe and degraded-mode status for a backend service", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults are used when omitted
    #[arg(short, long, env = "GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "backend-guard starting");
    tracing::info!(
        dependency = %config.backend.name,
        base_url = %config.backend.base_url,
        health_path = %config.health_check.path,
        interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let ctx = Arc::new(GuardContext::from_config(config)?);
    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_handler(shutdown.clone());

    ctx.start();

    let admin = if ctx.config().admin.enabled {
        let listener = TcpListener::bind(&ctx.config().admin.bind_address).await?;
        let state = AdminState::new(ctx.clone());
        Some(tokio::spawn(serve_admin(listener, state, shutdown.subscribe())))
    } else {
        None
    };

    let mut stop = shutdown.subscribe();
    let mut status = ctx.aggregator().subscribe();
    let mut last_banner = status.borrow().banner();
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let banner = status.borrow_and_update().banner();
                if banner != last_banner {
                    tracing::warn!(from = %last_banner, to = %banner, "Banner state changed");
                    last_banner = banner;
                }
            }
            _ = stop.recv() => break,
        }
    }

    ctx.stop();
    if let Some(handle) = admin {
        if let Err(err) = handle.await? {
            tracing::error!(error = %err, "Admin API failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
