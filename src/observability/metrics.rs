//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_reloads_total` (counter): applied section reloads, by section
//! - `mirror_reload_skipped_total` (counter): payloads ignored, by reason
//! - `mirror_remote_errors_total` (counter): failed coordination calls, by op
//! - `mirror_listener_failures_total` (counter): failed reload listeners, by section
//! - `mirror_sections` (gauge): sections held in the cache
//! - `mirror_gray_rules_cached` (gauge): parsed gray rules memoized
//! - `mirror_gray_cache_resets_total` (counter): gray memo invalidations

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_reload(section: &str) {
    metrics::counter!("mirror_reloads_total", "section" => section.to_string()).increment(1);
}

pub fn record_reload_skipped(reason: &'static str) {
    metrics::counter!("mirror_reload_skipped_total", "reason" => reason).increment(1);
}

pub fn record_remote_error(op: &'static str) {
    metrics::counter!("mirror_remote_errors_total", "op" => op).increment(1);
}

pub fn record_listener_failure(section: &str) {
    metrics::counter!("mirror_listener_failures_total", "section" => section.to_string())
        .increment(1);
}

pub fn record_section_count(count: usize) {
    metrics::gauge!("mirror_sections").set(count as f64);
}

pub fn record_gray_rules_cached(count: usize) {
    metrics::gauge!("mirror_gray_rules_cached").set(count as f64);
}

pub fn record_gray_cache_reset() {
    metrics::counter!("mirror_gray_cache_resets_total").increment(1);
}
