//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_connections_total` (counter): accepted connections by listener
//! - `gateway_routing_failures_total` (counter): 404s by reason
//! - `gateway_tunnels_total` (counter): finished tunnels by outcome
//! - `gateway_tunnel_duration_seconds` (histogram): hijack to teardown
//! - `gateway_reloads_total` (counter): registry reloads by outcome
//! - `gateway_registry_backends` (gauge): entries in the active registry
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - The Prometheus exporter runs its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection(listener: &'static str) {
    counter!("gateway_connections_total", "listener" => listener).increment(1);
}

pub fn record_routing_failure(reason: &'static str) {
    counter!("gateway_routing_failures_total", "reason" => reason).increment(1);
}

pub fn record_tunnel(outcome: &'static str, started: Instant) {
    counter!("gateway_tunnels_total", "outcome" => outcome).increment(1);
    histogram!("gateway_tunnel_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_reload(outcome: &'static str) {
    counter!("gateway_reloads_total", "outcome" => outcome).increment(1);
}

pub fn set_registry_size(backends: usize) {
    gauge!("gateway_registry_backends").set(backends as f64);
}
