//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_admissions_total` (counter): admission outcomes by `outcome`
//! - `gatekeeper_registry_clients` (gauge): clients currently tracked
//! - `gatekeeper_sweep_evictions_total` (counter): idle clients evicted
//! - `gatekeeper_shutdowns_total` (counter): shutdown results by `outcome`
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is optional and off by default

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(outcome: &'static str) {
    metrics::counter!("gatekeeper_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_sweep(evicted: usize, remaining: usize) {
    metrics::counter!("gatekeeper_sweep_evictions_total").increment(evicted as u64);
    metrics::gauge!("gatekeeper_registry_clients").set(remaining as f64);
}

pub fn record_shutdown(outcome: &'static str) {
    metrics::counter!("gatekeeper_shutdowns_total", "outcome" => outcome).increment(1);
}
