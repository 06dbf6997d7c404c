//! Metrics definitions for the provisioning service.
//!
//! All metrics use the `provisioning_` prefix; counters end in `_total`.
//! Label values are bounded: `endpoint` is one of the routed paths or
//! `/other`, `status` is `success`, `error` or `timeout`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle `/metrics` renders
/// from.
///
/// # Errors
///
/// Returns error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("provisioning_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Metric: `provisioning_http_requests_total`,
/// `provisioning_http_request_duration_seconds`.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("provisioning_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("provisioning_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Metric: `provisioning_meetings_created_total`.
pub fn record_meeting_created() {
    counter!("provisioning_meetings_created_total").increment(1);
}

/// Metric: `provisioning_attendees_created_total`.
pub fn record_attendee_created() {
    counter!("provisioning_attendees_created_total").increment(1);
}

/// Metric: `provisioning_meetings_ended_total`.
pub fn record_meeting_ended() {
    counter!("provisioning_meetings_ended_total").increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Routed paths are static; anything else collapses to `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/join" => "/join",
        "/end" => "/end",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}
