//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_batches_total` (counter): batches by outcome
//! - `router_batch_duration_seconds` (histogram): end-to-end batch latency
//! - `router_items_total` (counter): items by outcome
//! - `router_assignments_total` (counter): backend calls by instance, outcome
//! - `router_assignment_duration_seconds` (histogram): backend call latency
//! - `router_instance_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::backend::InstanceAddress;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_batch(outcome: &'static str, start: Instant) {
    metrics::counter!("router_batches_total", "outcome" => outcome).increment(1);
    metrics::histogram!("router_batch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_items(outcome: &'static str, count: usize) {
    if count > 0 {
        metrics::counter!("router_items_total", "outcome" => outcome).increment(count as u64);
    }
}

pub fn record_assignment(address: &InstanceAddress, outcome: &'static str, latency: Duration) {
    let instance = address.to_string();
    metrics::counter!(
        "router_assignments_total",
        "instance" => instance.clone(),
        "outcome" => outcome
    )
        .increment(1);
    metrics::histogram!("router_assignment_duration_seconds", "instance" => instance)
        .record(latency.as_secs_f64());
}

pub fn record_instance_health(address: &InstanceAddress, healthy: bool) {
    metrics::gauge!("router_instance_healthy", "instance" => address.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
