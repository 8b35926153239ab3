//! Prometheus metrics for crm-relay-server.
//!
//! Exposes relay metrics in Prometheus format at the `/metrics` endpoint.

use axum::http::StatusCode;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and return a handle for rendering.
///
/// The recorder is process-global; later calls return the first handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Describe metrics for better documentation in /metrics output
    describe_counter!(
        "crm_relay_requests_total",
        "Total number of relay requests by action and response status"
    );
    describe_histogram!(
        "crm_relay_request_duration_seconds",
        "Duration of relay requests in seconds"
    );
    describe_counter!(
        "crm_relay_outbound_failures_total",
        "Failed calls to flow endpoints by target"
    );

    Ok(HANDLE.get_or_init(|| handle).clone())
}

/// Record one handled relay request.
pub fn record_request(action: &'static str, status: StatusCode, duration: Duration) {
    counter!(
        "crm_relay_requests_total",
        "action" => action,
        "status" => status.as_str().to_string()
    )
    .increment(1);
    histogram!("crm_relay_request_duration_seconds", "action" => action)
        .record(duration.as_secs_f64());
}

/// Record a failed call to a flow endpoint (`otp_flow` or `workflow`).
pub fn record_outbound_failure(target: &'static str) {
    counter!("crm_relay_outbound_failures_total", "target" => target).increment(1);
}
