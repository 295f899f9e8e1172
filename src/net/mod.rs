//! Connection subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded WebSocket
//!     → coordinator.rs (accept, per-connection Session, dispatch boundary)
//!     → connection.rs (Socket handle, outbound queue, lifecycle state)
//!     → registry.rs (tag → Socket, released on close)
//!
//! Connection States:
//!     Connecting → Open → Closing → Closed
//! ```
//!
//! # Design Decisions
//! - A Socket's state lock is always taken before a registry shard lock
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod coordinator;
pub mod registry;

pub use connection::{ConnectionId, ConnectionState, ConnectionTracker, Outbound, Socket};
pub use coordinator::{Coordinator, DispatchOutcome, Session};
pub use registry::TagRegistry;
