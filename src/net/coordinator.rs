//! Connection lifecycle coordination.
//!
//! # Responsibilities
//! - Turn transport accept/message/close callbacks into routed Requests
//! - Guarantee one `connect`, ordered `message`s and one `close` per connection
//! - Always release the connection's tag after the `close` dispatch
//! - Contain handler failures at the dispatch boundary
//!
//! # Data Flow
//! ```text
//! transport accept  → Coordinator::accept  → Session (Connecting → Open)
//! transport message → Session::on_message  → Router::dispatch
//! transport close   → Session::on_close    → Router::dispatch → TagRegistry::remove (Closed)
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::mpsc;

use crate::config::{UnroutedAction, WebSocketConfig};
use crate::error::{BoxError, Error};
use crate::net::connection::{ConnectionGuard, ConnectionState, ConnectionTracker, Outbound, Socket};
use crate::net::registry::TagRegistry;
use crate::observability::metrics;
use crate::routing::{Method, Payload, Request, Router};

/// Outcome of one dispatch, as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Unrouted,
    Failed,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Handled => "handled",
            DispatchOutcome::Unrouted => "unrouted",
            DispatchOutcome::Failed => "failed",
        }
    }
}

/// Owns the root router and the tag registry; feeds lifecycle events to them.
#[derive(Clone)]
pub struct Coordinator {
    router: Arc<Router>,
    registry: Arc<TagRegistry>,
    tracker: ConnectionTracker,
    config: WebSocketConfig,
}

impl Coordinator {
    pub fn new(router: Router, registry: Arc<TagRegistry>, config: WebSocketConfig) -> Self {
        Self {
            router: Arc::new(router),
            registry,
            tracker: ConnectionTracker::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Find the live connection bound to `tag`.
    pub fn lookup(&self, tag: &str) -> Option<Socket> {
        self.registry.lookup(tag)
    }

    /// Register a freshly accepted connection and dispatch its `connect` event.
    pub async fn accept(&self, target: &str, outbound: mpsc::Sender<Outbound>) -> Session {
        self.accept_tracked(target, outbound, self.tracker.track()).await
    }

    /// Like [`Coordinator::accept`], for a connection whose slot was already
    /// reserved with [`ConnectionTracker::try_track`].
    pub async fn accept_tracked(
        &self,
        target: &str,
        outbound: mpsc::Sender<Outbound>,
        guard: ConnectionGuard,
    ) -> Session {
        let socket = Socket::new(outbound, Arc::clone(&self.registry));
        let session = Session {
            coordinator: self.clone(),
            socket,
            target: target.to_string(),
            closed: false,
            _guard: guard,
        };
        metrics::record_connection_opened();
        tracing::debug!(connection_id = %session.socket.id(), target = %target, "Connection accepted");

        let outcome = self
            .dispatch(&session.socket, Request::connect(&session.target))
            .await;
        session.socket.transition(ConnectionState::Open);

        if outcome == DispatchOutcome::Unrouted && self.config.unrouted_connect == UnroutedAction::Close {
            tracing::info!(
                connection_id = %session.socket.id(),
                code = self.config.unrouted_close_code,
                "Closing unrouted connection"
            );
            if let Err(e) = session
                .socket
                .close(self.config.unrouted_close_code, "no route")
                .await
            {
                tracing::debug!(connection_id = %session.socket.id(), error = %e, "Close request dropped");
            }
        }

        session
    }

    /// Route one event, containing every failure at this boundary.
    async fn dispatch(&self, socket: &Socket, req: Request) -> DispatchOutcome {
        let method = req.method();
        let path = req.path().to_string();
        let start = Instant::now();
        tracing::info!(connection_id = %socket.id(), "{} {}", method, path);

        let result = AssertUnwindSafe(self.router.dispatch(socket.clone(), req))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::Handler(panic_message(panic))));

        let outcome = match result {
            Ok(()) => DispatchOutcome::Handled,
            Err(Error::NoRouteFound { .. }) => {
                match method {
                    Method::Close => {
                        tracing::debug!(connection_id = %socket.id(), path = %path, "No close route, nothing to do")
                    }
                    _ => tracing::warn!(connection_id = %socket.id(), method = %method, path = %path, "No route matched"),
                }
                DispatchOutcome::Unrouted
            }
            Err(e) => {
                tracing::error!(
                    connection_id = %socket.id(),
                    method = %method,
                    path = %path,
                    kind = e.kind(),
                    error = %e,
                    "Handler chain failed"
                );
                DispatchOutcome::Failed
            }
        };

        metrics::record_dispatch(method.as_str(), outcome.as_str(), start);
        outcome
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("routes", &self.router.table().len())
            .field("tagged", &self.registry.len())
            .field("active", &self.tracker.active_count())
            .finish()
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> BoxError {
    let msg = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("handler panicked: {msg}").into()
}

/// Per-connection lifecycle. Consumed by [`Session::on_close`].
pub struct Session {
    coordinator: Coordinator,
    socket: Socket,
    target: String,
    closed: bool,
    _guard: ConnectionGuard,
}

impl Session {
    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    /// Dispatch an inbound message. Failures are logged and never close the connection.
    pub async fn on_message(&self, payload: Payload) -> DispatchOutcome {
        metrics::record_inbound_bytes(payload.len());
        self.coordinator
            .dispatch(&self.socket, Request::message(&self.target, payload))
            .await
    }

    /// Dispatch the `close` event, then release the tag and mark the socket closed.
    pub async fn on_close(mut self, code: Option<u16>) -> DispatchOutcome {
        self.socket.transition(ConnectionState::Closing);
        let outcome = self
            .coordinator
            .dispatch(&self.socket, Request::close(&self.target, code))
            .await;
        self.finish();
        tracing::debug!(connection_id = %self.socket.id(), code = ?code, "Connection closed");
        outcome
    }

    fn finish(&mut self) {
        self.socket.transition(ConnectionState::Closing);
        self.coordinator.registry.remove(&self.socket);
        self.socket.transition(ConnectionState::Closed);
        if !self.closed {
            self.closed = true;
            metrics::record_connection_closed();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                connection_id = %self.socket.id(),
                "Session dropped before close, releasing tag without close dispatch"
            );
            self.finish();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("socket", &self.socket)
            .field("target", &self.target)
            .field("closed", &self.closed)
            .finish()
    }
}
