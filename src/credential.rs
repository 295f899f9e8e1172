//! Credential issuance socket routes.
//!
//! A browser session opens `/did/:uid/socket` (under the configured mount
//! prefix) and is tagged `did:<uid>`, so an issuance flow can later push to it
//! through `POST /notify/did:<uid>`.

use serde_json::{json, Value};

use crate::error::Error;
use crate::net::connection::Socket;
use crate::routing::{HandlerResult, Next, Request, Router};

/// Close code sent when another connection already holds the session's tag.
pub const TAG_CONFLICT_CLOSE: u16 = 4409;

pub const SOCKET_PATTERN: &str = "/did/:uid/socket";

/// Tag under which the session for `uid` is registered.
pub fn session_tag(uid: &str) -> String {
    format!("did:{uid}")
}

/// Routes for the credential socket, to be mounted under a prefix.
pub fn router() -> Router {
    let mut router = Router::new();
    router
        .connect(SOCKET_PATTERN, on_connect)
        .message(SOCKET_PATTERN, on_message)
        .close(SOCKET_PATTERN, on_close);
    router
}

async fn on_connect(socket: Socket, req: Request, _next: Next) -> HandlerResult {
    let uid = req.param("uid").unwrap_or_default().to_string();
    let tag = session_tag(&uid);

    match socket.set_tag(tag.clone()) {
        Ok(()) => {}
        Err(Error::TagConflict { .. }) => {
            tracing::warn!(connection_id = %socket.id(), tag = %tag, "Session already open elsewhere");
            socket.close(TAG_CONFLICT_CLOSE, "session already open").await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(connection_id = %socket.id(), uid = %uid, "Credential session connected");
    socket
        .send_json(&json!({ "type": "connected", "uid": uid }))
        .await?;
    Ok(())
}

async fn on_message(socket: Socket, req: Request, _next: Next) -> HandlerResult {
    let body: Value = req.json()?;
    let kind = body.get("type").and_then(Value::as_str).unwrap_or("-");
    tracing::debug!(
        connection_id = %socket.id(),
        uid = req.param("uid").unwrap_or_default(),
        kind,
        "Credential message"
    );
    socket.send_json(&json!({ "type": "ack" })).await?;
    Ok(())
}

async fn on_close(socket: Socket, req: Request, _next: Next) -> HandlerResult {
    tracing::info!(
        connection_id = %socket.id(),
        uid = req.param("uid").unwrap_or_default(),
        code = ?req.close_code(),
        "Credential session closed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::Outbound;
    use crate::routing::Payload;

    fn mounted() -> Router {
        let mut root = Router::new();
        root.mount("/credential", router());
        root
    }

    fn text(frame: Outbound) -> Value {
        match frame {
            Outbound::Text(t) => serde_json::from_str(&t).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_tags_and_greets() {
        let router = mounted();
        let (socket, mut rx) = Socket::detached();

        router
            .dispatch(socket.clone(), Request::connect("/credential/did/42/socket"))
            .await
            .unwrap();

        assert_eq!(socket.tag().as_deref(), Some("did:42"));
        let greeting = text(rx.recv().await.unwrap());
        assert_eq!(greeting["type"], "connected");
        assert_eq!(greeting["uid"], "42");
    }

    #[tokio::test]
    async fn test_message_is_acknowledged() {
        let router = mounted();
        let (socket, mut rx) = Socket::detached();

        let req = Request::message(
            "/credential/did/42/socket",
            Payload::Text(r#"{"type":"offer"}"#.into()),
        );
        router.dispatch(socket, req).await.unwrap();

        assert_eq!(text(rx.recv().await.unwrap())["type"], "ack");
    }

    #[tokio::test]
    async fn test_invalid_json_fails_the_dispatch() {
        let router = mounted();
        let (socket, mut rx) = Socket::detached();

        let req = Request::message("/credential/did/42/socket", Payload::Text("not json".into()));
        let err = router.dispatch(socket, req).await.unwrap_err();

        assert_eq!(err.kind(), "handler");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unmounted_path_is_unrouted() {
        let router = mounted();
        let (socket, _rx) = Socket::detached();

        let err = router
            .dispatch(socket, Request::connect("/did/42/socket"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoRouteFound { .. }));
    }
}
