//! Cross-module addressing over HTTP.
//!
//! `POST /notify/{tag}` pushes the request body to the socket bound to `tag`,
//! the way an issuance flow elsewhere in the application reaches the browser
//! session that started it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Serialize)]
struct Delivered {
    tag: String,
    connection_id: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: u64,
    pub tagged: usize,
}

pub async fn notify_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    body: String,
) -> impl IntoResponse {
    let Some(socket) = state.coordinator.lookup(&tag) else {
        tracing::debug!(tag = %tag, "Notify for unknown tag");
        metrics::record_notify("unknown_tag");
        return (StatusCode::NOT_FOUND, "Unknown tag").into_response();
    };

    match socket.send_text(body).await {
        Ok(()) => {
            metrics::record_notify("delivered");
            let delivered = Delivered {
                tag,
                connection_id: socket.id().to_string(),
            };
            (StatusCode::ACCEPTED, Json(delivered)).into_response()
        }
        Err(e) => {
            tracing::warn!(tag = %tag, error = %e, "Notify target is gone");
            metrics::record_notify("gone");
            (StatusCode::GONE, "Connection closed").into_response()
        }
    }
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        connections: state.coordinator.tracker().active_count(),
        tagged: state.coordinator.registry().len(),
    })
}
