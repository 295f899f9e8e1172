//! Error taxonomy for routing, tagging and dispatch.

use thiserror::Error;

use crate::net::connection::ConnectionId;
use crate::routing::Method;

/// Error type returned by handlers. Anything boxable converts into it with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the router, the tag registry and connection handles.
#[derive(Error, Debug)]
pub enum Error {
    /// No terminal route matched the event. Not fatal; the event is dropped.
    #[error("no route found for {method} {path}")]
    NoRouteFound { method: Method, path: String },

    /// The tag is already bound to a different live connection.
    #[error("tag '{tag}' is already bound to another connection")]
    TagConflict { tag: String },

    /// The connection already carries a different tag.
    #[error("{id} is already tagged '{current}', refusing to retag as '{requested}'")]
    DoubleTag {
        id: ConnectionId,
        current: String,
        requested: String,
    },

    /// Tagging was attempted once the connection started closing.
    #[error("{id} is closing, refusing to tag as '{requested}'")]
    TaggedAfterClose { id: ConnectionId, requested: String },

    /// The outbound queue of the connection is gone.
    #[error("{id} is closed")]
    ConnectionClosed { id: ConnectionId },

    /// A handler in the chain failed or panicked.
    #[error("handler failed: {0}")]
    Handler(BoxError),

    /// A payload could not be encoded or decoded as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request carries no payload to decode.
    #[error("{method} event carries no payload")]
    MissingPayload { method: Method },
}

impl Error {
    /// Short label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NoRouteFound { .. } => "no_route",
            Error::TagConflict { .. } => "tag_conflict",
            Error::DoubleTag { .. } | Error::TaggedAfterClose { .. } => "double_tag",
            Error::ConnectionClosed { .. } => "closed",
            Error::Handler(_) => "handler",
            Error::Json(_) => "json",
            Error::MissingPayload { .. } => "missing_payload",
        }
    }
}
