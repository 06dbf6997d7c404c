//! Metrics emitted by the meeting client.
//!
//! All metrics use the `client_` prefix and go through the `metrics` facade;
//! the embedding shell decides whether a recorder is installed.
//!
//! # Cardinality
//!
//! - `disposition`: 3 values (`forwarded_success`, `forwarded_failure`, `local_only`)
//! - `reason`: bounded by [`crate::facade::SessionStatusCode`]

use metrics::{counter, gauge};

/// Record the number of bound display slots.
///
/// Metric: `client_tiles_bound`
#[allow(clippy::cast_precision_loss)]
pub fn set_tiles_bound(bound: usize) {
    gauge!("client_tiles_bound").set(bound as f64);
}

/// Record a tile dropped for lack of a display slot.
///
/// Metric: `client_tile_capacity_exceeded_total`
pub fn record_tile_capacity_exceeded() {
    counter!("client_tile_capacity_exceeded_total").increment(1);
}

/// Record a failed facade-driven async task.
///
/// Metric: `client_async_faults_total`
pub fn record_async_fault() {
    counter!("client_async_faults_total").increment(1);
}

/// Record a diagnostic event by filter outcome.
///
/// Metric: `client_diagnostic_events_total`
/// Labels: `disposition`
pub fn record_diagnostic_event(disposition: &'static str) {
    counter!("client_diagnostic_events_total", "disposition" => disposition).increment(1);
}

/// Record a session stop reported by the facade.
///
/// Metric: `client_session_stops_total`
/// Labels: `reason`, `disposition`
pub fn record_session_stop(reason: &'static str, disposition: &'static str) {
    counter!(
        "client_session_stops_total",
        "reason" => reason,
        "disposition" => disposition
    )
    .increment(1);
}
