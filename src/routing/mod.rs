//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Lifecycle event (method, path)
//!     → request.rs (Request built fresh per event)
//!     → router.rs (dispatch)
//!     → table.rs (resolve handler chain)
//!     → pattern.rs (segment matching, parameter binding)
//!     → handler.rs (run chain, explicit `Next` hand-off)
//!
//! Route Registration (at startup):
//!     Router::{use_at, connect, message, close, mount}
//!     → appended to RouteTable in registration order
//!     → shared via Arc, immutable while serving
//! ```
//!
//! # Design Decisions
//! - First registered terminal entry wins
//! - `use` entries are method-agnostic prefix matches and only run ahead
//!   of a terminal entry registered after them
//! - No regex, no wildcard segments: segment counts must line up
//! - Explicit NoRouteFound rather than silent default

pub mod handler;
pub mod pattern;
pub mod request;
pub mod router;
pub mod table;

pub use handler::{handler, BoxHandler, Handler, HandlerResult, Next};
pub use pattern::{Params, Pattern};
pub use request::{Method, Payload, Request};
pub use router::Router;
pub use table::{ChainLink, Resolved, RouteTable};
