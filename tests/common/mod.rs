//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use socket_router::config::ServerConfig;
use socket_router::net::Coordinator;
use socket_router::{HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub coordinator: Coordinator,
}

impl TestServer {
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, path: &str) -> Client {
        let (ws, _) = tokio_tungstenite::connect_async(self.ws_url(path))
            .await
            .expect("WebSocket handshake failed");
        ws
    }

    /// Poll until `tag` is unbound or the timeout elapses.
    pub async fn wait_until_released(&self, tag: &str) -> bool {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if self.coordinator.lookup(tag).is_none() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Wait until no connection is live or the timeout elapses.
    pub async fn wait_until_drained(&self) -> bool {
        self.coordinator
            .tracker()
            .wait_for_drain(RECV_TIMEOUT)
            .await
    }
}

/// Start a server for `coordinator` on 127.0.0.1 with an ephemeral port.
pub async fn start_server(mut config: ServerConfig, coordinator: Coordinator) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(coordinator.clone(), &config, shutdown.clone());
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    TestServer {
        addr,
        shutdown,
        coordinator,
    }
}

/// Start a server with the default application routes.
pub async fn start_app(config: ServerConfig) -> TestServer {
    let coordinator = socket_router::app_coordinator(&config);
    start_server(config, coordinator).await
}

/// Next data or close frame, skipping pings and pongs.
pub async fn next_frame(ws: &mut Client) -> Message {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        match frame {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

pub async fn next_text(ws: &mut Client) -> String {
    match next_frame(ws).await {
        Message::Text(text) => text.as_str().to_owned(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

pub async fn next_json(ws: &mut Client) -> serde_json::Value {
    serde_json::from_str(&next_text(ws).await).expect("frame is not JSON")
}

/// Close code of the next frame, which must be a close frame.
pub async fn next_close_code(ws: &mut Client) -> Option<u16> {
    match next_frame(ws).await {
        Message::Close(frame) => frame.map(|f| u16::from(f.code)),
        other => panic!("expected close frame, got {other:?}"),
    }
}
