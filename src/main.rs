//! Search Gate (v1)
//!
//! Admission and failure-isolation front for a browser search application.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  SEARCH GATE                     │
//!                         │                                                  │
//!   Client Request        │  ┌──────────┐   ┌─────────────┐   ┌───────────┐  │
//!   ──────────────────────┼─▶│  http    │──▶│ access gate │──▶│ handlers  │  │
//!                         │  │ server   │   │ token+quota │   │           │  │
//!                         │  └──────────┘   └─────────────┘   └─────┬─────┘  │
//!                         │                                         │        │
//!                         │                                         ▼        │
//!   Client Response       │                                 ┌──────────────┐ │
//!   ◀─────────────────────┼─────────────────────────────────│circuit breaker│◀┼── Search /
//!                         │                                 │  per key     │ │   Inference
//!                         │                                 └──────────────┘ │   upstreams
//!                         │                                                  │
//!                         │  config · observability · lifecycle · admin     │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use search_gate::admin::{setup_admin_router, AdminState};
use search_gate::config::load_config;
use search_gate::lifecycle::{shutdown, signals, Shutdown};
use search_gate::observability::{logging, metrics};
use search_gate::HttpServer;

#[derive(Parser)]
#[command(name = "search-gate")]
#[command(about = "Token-gated, circuit-broken front for search and inference", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "SEARCH_GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!("search-gate v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        access_enabled = config.access.enabled,
        failure_threshold = config.circuit_breaker.failure_threshold,
        reset_timeout_ms = config.circuit_breaker.reset_timeout_ms,
        success_threshold = config.circuit_breaker.success_threshold,
        rate_limit_points = config.rate_limit.points,
        rate_limit_window_secs = config.rate_limit.duration_secs,
        "Configuration loaded"
    );
    if !config.access.enabled {
        tracing::warn!("Access checks disabled; protected routes are open");
    }

    if config.observability.metrics_enabled {
        // Address validated at load time.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config.clone());

    if config.admin.enabled {
        let admin_router = setup_admin_router(AdminState::new(&config.admin.api_key, server.state()));
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(admin_listener, admin_router)
                .with_graceful_shutdown(shutdown::wait(admin_shutdown))
                .await
            {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        });
    }

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
