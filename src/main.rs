//! WebSocket connection router.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                  SOCKET ROUTER                    │
//!                     │                                                   │
//!   WebSocket client  │  ┌──────────┐   ┌─────────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│   http   │──▶│     net     │──▶│  routing  │  │
//!                     │  │ upgrade  │   │ coordinator │   │  Router   │  │
//!                     │  └──────────┘   └──────┬──────┘   └─────┬─────┘  │
//!                     │                        │                │        │
//!                     │                        ▼                ▼        │
//!   POST /notify/tag  │  ┌──────────┐   ┌─────────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│  notify  │──▶│ TagRegistry │◀──│ handlers  │  │
//!                     │  └──────────┘   └─────────────┘   └───────────┘  │
//!                     │                                                   │
//!                     │  config · observability · lifecycle               │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use socket_router::config::{load_config, ServerConfig};
use socket_router::lifecycle::{signals::shutdown_on_signal, Shutdown};
use socket_router::observability::{logging, metrics};
use socket_router::{app_coordinator, HttpServer};

#[derive(Parser)]
#[command(name = "socket-router")]
#[command(about = "WebSocket connection router", long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("socket-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        credential_enabled = config.credential.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let coordinator = app_coordinator(&config);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(coordinator, &config, shutdown);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
