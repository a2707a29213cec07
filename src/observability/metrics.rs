//! Metrics collection and exposition.
//!
//! # Metrics
//! - `solo_connections_accepted_total` (counter): clients admitted
//! - `solo_connections_rejected_total` (counter): clients closed on arrival
//! - `solo_bytes_received_total` (counter): raw bytes read
//! - `solo_shutdown_events_total` (counter): qualifying events by `kind`
//! - `solo_active_connection` (gauge): 1 while a client is attached
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::ShutdownEvent;

/// Install the Prometheus exporter on `addr`.
///
/// Must be called from within a Tokio runtime; the HTTP endpoint runs as a
/// task on it.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_accepted() {
    metrics::counter!("solo_connections_accepted_total").increment(1);
    metrics::gauge!("solo_active_connection").set(1.0);
}

pub fn record_rejected() {
    metrics::counter!("solo_connections_rejected_total").increment(1);
}

pub fn record_bytes(n: usize) {
    metrics::counter!("solo_bytes_received_total").increment(n as u64);
}

pub fn record_disconnected() {
    metrics::gauge!("solo_active_connection").set(0.0);
}

pub fn record_shutdown_event(event: ShutdownEvent) {
    metrics::counter!("solo_shutdown_events_total", "kind" => event.as_str()).increment(1);
}
