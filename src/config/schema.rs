//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// WebSocket transport and lifecycle settings.
    pub websocket: WebSocketConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Credential socket routes.
    pub credential: CredentialConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum concurrent sockets. Further upgrades get 503.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// What to do with a connection whose `connect` event matched no route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnroutedAction {
    /// Keep the connection open.
    #[default]
    Ignore,
    /// Close it with `unrouted_close_code`.
    Close,
}

/// WebSocket transport and lifecycle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Largest inbound message in bytes.
    pub max_message_size: usize,

    /// Outbound frames buffered per connection before `send` waits.
    pub outbound_buffer: usize,

    /// Action for connections no `connect` route matched.
    pub unrouted_connect: UnroutedAction,

    /// Close code used when `unrouted_connect = "close"`.
    pub unrouted_close_code: u16,

    /// Seconds to wait for sockets to drain on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024,
            outbound_buffer: 64,
            unrouted_connect: UnroutedAction::Ignore,
            unrouted_close_code: 1008, // Policy violation
            shutdown_grace_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    pub log_level: String,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Credential socket routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Mount the `/did/:uid/socket` routes.
    pub enabled: bool,

    /// Path prefix the routes are mounted under.
    pub mount_prefix: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mount_prefix: "/credential".to_string(),
        }
    }
}
