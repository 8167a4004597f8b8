//! Service health daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌───────────────────────────────────────────────────────┐
//!                │                    SERVICE HEALTH                      │
//!                │                                                        │
//!   GET /health  │  ┌─────────┐    ┌───────────────┐    ┌──────────────┐  │
//!  ──────────────┼─▶│  http   │───▶│ HealthMonitor │───▶│    probes    │  │
//!                │  │ server  │    │  (periodic +  │    │ db, bus, cb, │  │
//!                │  └─────────┘    │   on demand)  │    │ mem, domain  │  │
//!                │                 └───────────────┘    └──────┬───────┘  │
//!                │                                             │          │
//!                │                 ┌───────────────┐    ┌──────▼───────┐  │
//!                │                 │  event bus    │◀───│   circuit    │──┼──▶ Database
//!                │                 │ state changes │    │   breakers   │  │
//!                │                 └───────────────┘    └──────────────┘  │
//!                │                                                        │
//!                │  config · observability (tracing, metrics) · lifecycle │
//!                └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use service_health::config::{load_config, ServiceConfig};
use service_health::lifecycle::Application;
use service_health::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "service-health")]
#[command(
    about = "Circuit breakers and health endpoints for service dependencies",
    long_about = None
)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-health starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        database = %config.database.address,
        health_interval_secs = config.health.interval_secs,
        breaker_overrides = config.breakers.len(),
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let app = Application::build(config);
    app.run(listener).await?;

    Ok(())
}
