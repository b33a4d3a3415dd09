//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_webhooks_total` (counter): webhooks by family, status
//! - `relay_webhook_duration_seconds` (histogram): latency by family
//! - `relay_auth_failures_total` (counter): rejected secrets
//! - `relay_reloads_total` (counter): reloads by outcome
//! - `relay_generation` (gauge): id of the live generation
//!
//! # Design Decisions
//! - Labels are bounded: unknown apps share the `unknown` family label
//! - Exposition runs on its own address, separate from webhook traffic

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_webhook(family: &'static str, status: u16, started: Instant) {
    counter!("relay_webhooks_total", "family" => family, "status" => status.to_string())
        .increment(1);
    histogram!("relay_webhook_duration_seconds", "family" => family)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_auth_failure() {
    counter!("relay_auth_failures_total").increment(1);
}

pub fn record_reload(outcome: &'static str) {
    counter!("relay_reloads_total", "outcome" => outcome).increment(1);
}

pub fn set_generation(id: u64) {
    gauge!("relay_generation").set(id as f64);
}
