//! WebSocket connection router library.

pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ServerConfig;
pub use error::{BoxError, Error};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use net::{Coordinator, Socket, TagRegistry};
pub use routing::{Next, Request, Router};

use std::sync::Arc;

/// Root router for `config`: the credential routes, mounted when enabled.
pub fn app_router(config: &ServerConfig) -> Router {
    let mut root = Router::new();
    if config.credential.enabled {
        root.mount(&config.credential.mount_prefix, credential::router());
    }
    root
}

/// Coordinator over [`app_router`] with a fresh tag registry.
pub fn app_coordinator(config: &ServerConfig) -> Coordinator {
    Coordinator::new(
        app_router(config),
        Arc::new(TagRegistry::new()),
        config.websocket.clone(),
    )
}
