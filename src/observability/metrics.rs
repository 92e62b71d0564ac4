//! Metrics collection and exposition.
//!
//! # Metrics
//! - `podbalancer_requests_total` (counter): forwarded requests by status
//! - `podbalancer_forward_duration_seconds` (histogram): time spent per request
//! - `podbalancer_pod_transitions_total` (counter): registry writes by pod status
//! - `podbalancer_rotation_size` (gauge): pods currently in the rotation
//! - `podbalancer_registered_pods` (gauge): pods known to the registry

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::load_balancer::pod::PodStatus;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(status: u16, start: Instant) {
    ::metrics::counter!("podbalancer_requests_total", "status" => status.to_string()).increment(1);
    ::metrics::histogram!("podbalancer_forward_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_pod_transition(status: PodStatus) {
    ::metrics::counter!("podbalancer_pod_transitions_total", "status" => status.as_str())
        .increment(1);
}

pub fn record_registered_pods(count: usize) {
    ::metrics::gauge!("podbalancer_registered_pods").set(count as f64);
}

pub fn record_rotation_size(count: usize) {
    ::metrics::gauge!("podbalancer_rotation_size").set(count as f64);
}
