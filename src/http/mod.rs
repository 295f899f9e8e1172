//! HTTP and WebSocket transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing)
//!     → websocket.rs (upgrade, frame pump, Coordinator callbacks)
//!     → notify.rs (push to a tagged socket, health)
//! ```

pub mod notify;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
