//! WebSocket transport adapter.
//!
//! # Responsibilities
//! - Complete the upgrade handshake on any path
//! - Feed accept/message/close callbacks to the Coordinator
//! - Drain the connection's outbound queue into the socket
//! - Ask sockets to close when the server shuts down
//!
//! # Data Flow
//! ```text
//! Client ──frames──→ read loop ──→ Session::on_message ──→ Router
//! Client ←─frames─── writer task ←── mpsc queue ←── Socket::send
//! ```
//!
//! # Design Decisions
//! - Reads are sequential per connection, so events stay in arrival order
//! - Ping/pong handled by the transport, never routed
//! - Exactly one close event: close frame, stream end, read error, or no
//!   reply within `CLOSE_HANDSHAKE_TIMEOUT` after the server sent its close

use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::http::server::AppState;
use crate::net::connection::{ConnectionGuard, Outbound};
use crate::routing::Payload;

/// Close code reported when the transport fails without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code sent to clients when the server shuts down.
pub const GOING_AWAY: u16 = 1001;

const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);
/// How long to wait for the peer's reply after sending a close frame.
pub const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Upgrade handler mounted on every socket path.
pub async fn upgrade_handler(
    State(state): State<AppState>,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> Response {
    let tracker = state.coordinator.tracker();
    let Some(guard) = tracker.try_track(state.max_connections as u64) else {
        tracing::warn!(
            active = tracker.active_count(),
            max_connections = state.max_connections,
            "Connection limit reached, rejecting upgrade"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let max_message_size = state.coordinator.config().max_message_size;

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| serve_socket(socket, state, target, guard))
}

async fn serve_socket(ws: WebSocket, state: AppState, target: String, guard: ConnectionGuard) {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(state.coordinator.config().outbound_buffer);
    let (close_sent_tx, mut close_sent) = watch::channel(None::<u16>);
    let mut shutdown = state.shutdown.subscribe();

    let session = state.coordinator.accept_tracked(&target, tx, guard).await;
    let connection_id = session.socket().id();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let (message, close_code) = match frame {
                Outbound::Text(text) => (Message::Text(text.into()), None),
                Outbound::Binary(bytes) => (Message::Binary(bytes), None),
                Outbound::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })),
                    Some(code),
                ),
            };
            if let Err(e) = sink.send(message).await {
                tracing::debug!(connection_id = %connection_id, error = %e, "Write failed");
                return;
            }
            if close_code.is_some() {
                let _ = close_sent_tx.send(close_code);
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Once our close frame is out, the peer gets a bounded time to answer it.
    let close_wait = tokio::time::sleep(CLOSE_HANDSHAKE_TIMEOUT);
    tokio::pin!(close_wait);
    let mut sent_close: Option<u16> = None;
    let mut writer_done = false;
    let mut draining = false;

    let code = loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = shutdown.recv(), if !draining => {
                draining = true;
                if let Err(e) = session.socket().close(GOING_AWAY, "server shutting down").await {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Close request dropped");
                }
                continue;
            }
            changed = close_sent.changed(), if sent_close.is_none() && !writer_done => {
                writer_done = changed.is_err();
                sent_close = *close_sent.borrow_and_update();
                if sent_close.is_some() {
                    close_wait.as_mut().reset(Instant::now() + CLOSE_HANDSHAKE_TIMEOUT);
                }
                continue;
            }
            _ = &mut close_wait, if sent_close.is_some() => {
                tracing::debug!(
                    connection_id = %connection_id,
                    code = ?sent_close,
                    "Peer did not answer close frame"
                );
                break sent_close;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                session.on_message(Payload::Text(text.as_str().to_owned())).await;
            }
            Some(Ok(Message::Binary(bytes))) => {
                session.on_message(Payload::Binary(bytes)).await;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => break frame.map(|f| f.code).or(sent_close),
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Read failed");
                break Some(ABNORMAL_CLOSURE);
            }
            None => break sent_close,
        }
    };

    session.on_close(code).await;

    let abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, writer).await.is_err() {
        abort.abort();
    }
}
