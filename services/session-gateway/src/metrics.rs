//! Prometheus metrics exposition
//!
//! - `gateway_requests_total` (counter): labels `status`, `method`
//! - `gateway_request_duration_seconds` (histogram): label `status`
//! - `gateway_refresh_total` (counter): label `outcome`
//! - `gateway_logout_total` (counter): label `upstream`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Session endpoints answer from memory or one bounded upstream call, so the
/// buckets stop at the upstream timeout range.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("gateway_request_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("gateway_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

/// Record a refresh attempt: `success`, `missing_cookie` or `invalid`.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("gateway_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a logout with the upstream notification result: `ok`, `failed` or `skipped`.
pub fn record_logout(upstream: &'static str) {
    metrics::counter!("gateway_logout_total", "upstream" => upstream).increment(1);
}
