//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: socket upgrades, notify and health endpoints
//! - Wire up middleware (tracing)
//! - Serve with graceful shutdown, then drain live sockets

use std::io;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::notify::{health_handler, notify_handler};
use crate::http::websocket::upgrade_handler;
use crate::lifecycle::{shutdown, Shutdown};
use crate::net::coordinator::Coordinator;

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub shutdown: Shutdown,
    pub max_connections: usize,
}

/// HTTP front end for the socket router.
pub struct HttpServer {
    router: Router,
    state: AppState,
    shutdown_grace: Duration,
}

impl HttpServer {
    /// Create a new HTTP server around `coordinator`.
    pub fn new(coordinator: Coordinator, config: &ServerConfig, shutdown: Shutdown) -> Self {
        let state = AppState {
            coordinator,
            shutdown,
            max_connections: config.listener.max_connections,
        };
        Self {
            router: Self::build_router(state.clone()),
            state,
            shutdown_grace: Duration::from_secs(config.websocket.shutdown_grace_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/notify/{tag}", post(notify_handler))
            .route("/", get(upgrade_handler))
            .route("/{*path}", get(upgrade_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The Axum router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.state.coordinator
    }

    /// Run the server until the shutdown signal fires, then wait for sockets to drain.
    pub async fn run(self, listener: TcpListener) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let stop = shutdown::wait(self.state.shutdown.subscribe());
        axum::serve(listener, self.router)
            .with_graceful_shutdown(stop)
            .await?;

        let tracker = self.state.coordinator.tracker();
        let remaining = tracker.active_count();
        if remaining > 0 {
            tracing::info!(remaining, "Waiting for sockets to close");
            if !tracker.wait_for_drain(self.shutdown_grace).await {
                tracing::warn!(
                    remaining = tracker.active_count(),
                    "Shutdown grace period elapsed with sockets still open"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
