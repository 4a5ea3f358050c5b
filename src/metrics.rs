//! Prometheus metrics for whitelist decisions.
//!
//! Metrics are exposed via a dedicated HTTP listener (default port 9090).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `ip_whitelist_requests_total` - Requests evaluated by the whitelist
//!   (labels: `decision` = allow|deny, `origin` = remote_addr|x_forwarded_for|x_real_ip|missing)
//!
//! ## Gauges
//! - `ip_whitelist_ranges` - Number of CIDR ranges in the active whitelist
//!
//! Recording functions are safe to call before (or without) [`init_metrics`];
//! with no recorder installed they do nothing.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

use crate::error::{AppError, AppResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "ip_whitelist_requests_total";
    pub const WHITELIST_RANGES: &str = "ip_whitelist_ranges";
}

/// Initialize the Prometheus metrics exporter.
///
/// Installs the global recorder, starts the HTTP listener on `metrics_addr`
/// and registers metric descriptions.
///
/// # Errors
///
/// Returns `AppError::MetricsError` if the exporter cannot be installed
/// (e.g. a recorder is already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> AppResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| AppError::MetricsError(format!("Failed to install Prometheus exporter: {e}")))?;

    describe_counter!(
        names::REQUESTS_TOTAL,
        "Total number of requests evaluated by the IP whitelist"
    );
    describe_gauge!(
        names::WHITELIST_RANGES,
        "Number of CIDR ranges in the active IP whitelist"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one whitelist decision.
pub fn record_whitelist_decision(decision: &'static str, origin: &'static str) {
    counter!(names::REQUESTS_TOTAL, "decision" => decision, "origin" => origin).increment(1);
}

/// Publish the size of the active whitelist.
pub fn set_whitelist_ranges(count: usize) {
    gauge!(names::WHITELIST_RANGES).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only verify the functions don't panic without a recorder.

    #[test]
    fn test_record_whitelist_decision() {
        record_whitelist_decision("allow", "remote_addr");
        record_whitelist_decision("deny", "x_forwarded_for");
    }

    #[test]
    fn test_set_whitelist_ranges() {
        set_whitelist_ranges(0);
        set_whitelist_ranges(4);
    }
}
