//! Metrics collection and exposition.
//!
//! # Metrics
//! - `socket_connections_active` (gauge): live sockets
//! - `socket_connections_total` (counter): accepted sockets
//! - `socket_dispatch_total` (counter): dispatches by method, outcome
//! - `socket_dispatch_duration_seconds` (histogram): handler chain latency
//! - `socket_inbound_bytes_total` (counter): message payload bytes
//! - `socket_tags_active` (gauge): bound tags
//! - `socket_tag_conflicts_total` (counter): rejected tag registrations
//! - `socket_notify_total` (counter): pushes by outcome
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_opened() {
    metrics::counter!("socket_connections_total").increment(1);
    metrics::gauge!("socket_connections_active").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("socket_connections_active").decrement(1.0);
}

pub fn record_dispatch(method: &'static str, outcome: &'static str, start: Instant) {
    metrics::counter!("socket_dispatch_total", "method" => method, "outcome" => outcome).increment(1);
    metrics::histogram!("socket_dispatch_duration_seconds", "method" => method)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_inbound_bytes(bytes: usize) {
    metrics::counter!("socket_inbound_bytes_total").increment(bytes as u64);
}

pub fn record_tagged(active: usize) {
    metrics::gauge!("socket_tags_active").set(active as f64);
}

pub fn record_tag_conflict() {
    metrics::counter!("socket_tag_conflicts_total").increment(1);
}

pub fn record_notify(outcome: &'static str) {
    metrics::counter!("socket_notify_total", "outcome" => outcome).increment(1);
}
