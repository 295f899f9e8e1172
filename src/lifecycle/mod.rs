//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → close sockets (1001) → drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, ask sockets to close, drain
//! - Draining has a deadline: remaining sockets are dropped after it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
