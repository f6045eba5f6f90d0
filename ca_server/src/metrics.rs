//! Prometheus metrics for the auth server.
//!
//! Counters are recorded through the `metrics` facade and are no-ops until
//! [`init_metrics`] installs the exporter.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ca_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/auth/login", 200);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Increments the total HTTP request counter with method, path, and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment login attempts counter.
pub fn login_attempts_total(success: bool) {
    metrics::counter!("login_attempts_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Count a refresh call by outcome (`rotated` or an error kind).
pub fn token_refresh_total(outcome: &'static str) {
    metrics::counter!("token_refresh_total", "outcome" => outcome).increment(1);
}

/// Increment reuse detections.
pub fn token_reuse_detected_total() {
    metrics::counter!("token_reuse_detected_total").increment(1);
}

/// Count a logout by scope (`session` or `all`).
pub fn logout_total(scope: &'static str) {
    metrics::counter!("logout_total", "scope" => scope).increment(1);
}
