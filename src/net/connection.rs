//! Connection handles, lifecycle state and live-connection tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track connection state (Connecting → Open → Closing → Closed)
//! - Expose the `Socket` handle handlers use to send, close and tag
//! - Count live connections for limits and shutdown draining

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::body::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::net::registry::TagRegistry;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking. Transitions are linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// Accepted; the `connect` event is being dispatched.
    Connecting,
    /// Connected and receiving messages.
    Open,
    /// Transport closed; the `close` event is being dispatched.
    Closing,
    /// Registry cleaned up. Terminal.
    Closed,
}

/// A frame queued for the transport writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Binary(Bytes),
    Close { code: u16, reason: String },
}

#[derive(Debug)]
struct SocketState {
    lifecycle: ConnectionState,
    tag: Option<String>,
}

struct SocketInner {
    id: ConnectionId,
    outbound: mpsc::Sender<Outbound>,
    registry: Arc<TagRegistry>,
    state: Mutex<SocketState>,
}

/// Handle to one live connection. Cheap to clone.
#[derive(Clone)]
pub struct Socket {
    inner: Arc<SocketInner>,
}

// The registry holds sockets, so Debug must not recurse into it.
impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("Socket")
            .field("id", &self.inner.id)
            .field("state", &state.lifecycle)
            .field("tag", &state.tag)
            .finish()
    }
}

impl Socket {
    pub(crate) fn new(outbound: mpsc::Sender<Outbound>, registry: Arc<TagRegistry>) -> Self {
        Self {
            inner: Arc::new(SocketInner {
                id: ConnectionId::new(),
                outbound,
                registry,
                state: Mutex::new(SocketState {
                    lifecycle: ConnectionState::Connecting,
                    tag: None,
                }),
            }),
        }
    }

    /// A socket backed by its own registry and queue, not attached to any transport.
    pub fn detached() -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(64);
        (Self::new(tx, Arc::new(TagRegistry::new())), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn tag(&self) -> Option<String> {
        self.lock_state().tag.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_state().lifecycle
    }

    /// True if both handles refer to the same connection.
    pub fn same_connection(&self, other: &Socket) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Tag this connection so other parts of the application can find it.
    ///
    /// Re-tagging with the same tag is a no-op. A different tag, or any tag
    /// once the connection is closing, is rejected and the existing binding
    /// is left untouched.
    pub fn set_tag(&self, tag: impl Into<String>) -> Result<(), Error> {
        let tag = tag.into();
        let mut state = self.lock_state();

        if state.lifecycle >= ConnectionState::Closing {
            tracing::error!(
                connection_id = %self.id(),
                requested = %tag,
                state = ?state.lifecycle,
                "Refusing to tag a closing connection"
            );
            return Err(Error::TaggedAfterClose {
                id: self.id(),
                requested: tag,
            });
        }

        if let Some(current) = &state.tag {
            if *current == tag {
                return Ok(());
            }
            tracing::error!(
                connection_id = %self.id(),
                current = %current,
                requested = %tag,
                "Connection tagged twice with different tags"
            );
            return Err(Error::DoubleTag {
                id: self.id(),
                current: current.clone(),
                requested: tag,
            });
        }

        self.inner.registry.register(&tag, self)?;
        tracing::debug!(connection_id = %self.id(), tag = %tag, "Connection tagged");
        state.tag = Some(tag);
        Ok(())
    }

    /// Queue a frame for the transport.
    pub async fn send(&self, frame: Outbound) -> Result<(), Error> {
        if self.state() == ConnectionState::Closed {
            return Err(Error::ConnectionClosed { id: self.id() });
        }
        self.inner
            .outbound
            .send(frame)
            .await
            .map_err(|_| Error::ConnectionClosed { id: self.id() })
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.send(Outbound::Text(text.into())).await
    }

    pub async fn send_binary(&self, bytes: impl Into<Bytes>) -> Result<(), Error> {
        self.send(Outbound::Binary(bytes.into())).await
    }

    pub async fn send_json<T: Serialize>(&self, value: &T) -> Result<(), Error> {
        let text = serde_json::to_string(value)?;
        self.send_text(text).await
    }

    /// Ask the transport to close the connection. The `close` event follows
    /// once the transport reports closure.
    pub async fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), Error> {
        self.send(Outbound::Close {
            code,
            reason: reason.into(),
        })
        .await
    }

    /// Advance the lifecycle. Returns the previous state.
    pub(crate) fn transition(&self, next: ConnectionState) -> ConnectionState {
        let mut state = self.lock_state();
        let previous = state.lifecycle;
        if next > previous {
            state.lifecycle = next;
        }
        previous
    }

    pub(crate) fn registry(&self) -> &Arc<TagRegistry> {
        &self.inner.registry
    }

    fn lock_state(&self) -> MutexGuard<'_, SocketState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tracks live connections for limits and graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
        }
    }

    /// Record a new connection unless `limit` are already live.
    ///
    /// The check and the increment are one atomic step, so concurrent callers
    /// can never push the count past `limit`.
    pub fn try_track(&self, limit: u64) -> Option<ConnectionGuard> {
        self.active_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < limit).then_some(count + 1)
            })
            .ok()?;
        Some(ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
        })
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until all connections are closed or the deadline passes.
    /// Returns true if every connection drained.
    pub async fn wait_for_drain(&self, deadline: Duration) -> bool {
        let drained = async {
            while self.active_count.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(deadline, drained).await.is_ok()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn try_track_respects_limit() {
        let tracker = ConnectionTracker::new();
        let first = tracker.try_track(2).unwrap();
        let _second = tracker.try_track(2).unwrap();
        assert!(tracker.try_track(2).is_none());
        assert_eq!(tracker.active_count(), 2);

        drop(first);
        assert!(tracker.try_track(2).is_some());
    }

    #[test]
    fn try_track_concurrent_never_exceeds_limit() {
        let tracker = ConnectionTracker::new();
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || tracker.try_track(5))
            })
            .collect();

        let guards: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(guards.len(), 5);
        assert_eq!(tracker.active_count(), 5);
    }

    #[tokio::test]
    async fn tracker_drain_times_out_while_held() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();
        assert!(!tracker.wait_for_drain(Duration::from_millis(120)).await);
        drop(guard);
        assert!(tracker.wait_for_drain(Duration::from_millis(120)).await);
    }

    #[test]
    fn set_tag_registers_and_is_idempotent() {
        let (socket, _rx) = Socket::detached();
        socket.set_tag("user-42").unwrap();
        socket.set_tag("user-42").unwrap();

        assert_eq!(socket.tag().as_deref(), Some("user-42"));
        let found = socket.registry().lookup("user-42").unwrap();
        assert!(found.same_connection(&socket));
    }

    #[test]
    fn set_tag_rejects_second_tag() {
        let (socket, _rx) = Socket::detached();
        socket.set_tag("a").unwrap();

        let err = socket.set_tag("b").unwrap_err();
        assert!(matches!(err, Error::DoubleTag { ref current, ref requested, .. } if current == "a" && requested == "b"));
        assert_eq!(socket.tag().as_deref(), Some("a"));
        assert!(socket.registry().lookup("b").is_none());
    }

    #[test]
    fn set_tag_rejected_once_closing() {
        let (socket, _rx) = Socket::detached();
        socket.transition(ConnectionState::Open);
        socket.transition(ConnectionState::Closing);

        let err = socket.set_tag("late").unwrap_err();
        assert!(matches!(err, Error::TaggedAfterClose { .. }));
        assert!(socket.registry().is_empty());
    }

    #[test]
    fn transition_never_goes_back() {
        let (socket, _rx) = Socket::detached();
        assert_eq!(socket.state(), ConnectionState::Connecting);
        assert_eq!(socket.transition(ConnectionState::Closed), ConnectionState::Connecting);
        assert_eq!(socket.transition(ConnectionState::Open), ConnectionState::Closed);
        assert_eq!(socket.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn send_queues_frames_until_closed() {
        let (socket, mut rx) = Socket::detached();
        socket.send_text("hello").await.unwrap();
        socket.send_json(&serde_json::json!({"ok": true})).await.unwrap();
        socket.close(1000, "bye").await.unwrap();

        assert_eq!(rx.recv().await, Some(Outbound::Text("hello".into())));
        assert_eq!(rx.recv().await, Some(Outbound::Text(r#"{"ok":true}"#.into())));
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Close { code: 1000, reason: "bye".into() })
        );

        socket.transition(ConnectionState::Closed);
        assert!(matches!(
            socket.send_text("late").await,
            Err(Error::ConnectionClosed { .. })
        ));
    }

    #[tokio::test]
    async fn send_fails_when_transport_gone() {
        let (socket, rx) = Socket::detached();
        drop(rx);
        assert!(matches!(
            socket.send_binary(Bytes::from_static(b"x")).await,
            Err(Error::ConnectionClosed { .. })
        ));
    }
}
