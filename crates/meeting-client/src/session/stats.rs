//! Connection statistics derived from facade metric reports.

use crate::facade::ClientMetricReport;
use tracing::trace;

/// Available bandwidth in kbps; `None` when the facade does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandwidthReport {
    pub uplink_kbps: Option<f64>,
    pub downlink_kbps: Option<f64>,
}

fn known(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

impl BandwidthReport {
    /// Prefer the estimated bandwidth, fall back to the transport bitrate.
    #[must_use]
    pub fn from_report(report: &ClientMetricReport) -> Self {
        let uplink = known(report.available_send_bandwidth)
            .or_else(|| known(report.available_outgoing_bitrate));
        let downlink = known(report.available_receive_bandwidth)
            .or_else(|| known(report.available_incoming_bitrate));
        Self {
            uplink_kbps: uplink.map(|bps| bps / 1000.0),
            downlink_kbps: downlink.map(|bps| bps / 1000.0),
        }
    }

    #[must_use]
    pub fn uplink_label(&self) -> String {
        label("Uplink", self.uplink_kbps)
    }

    #[must_use]
    pub fn downlink_label(&self) -> String {
        label("Downlink", self.downlink_kbps)
    }
}

fn label(direction: &str, kbps: Option<f64>) -> String {
    match kbps {
        Some(kbps) => format!("Available {direction} Bandwidth: {kbps} Kbps"),
        None => format!("Available {direction} Bandwidth: Unknown"),
    }
}

/// Accumulated samples for the current session. Reset on leave and on
/// every stop.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatsCollector {
    samples: u64,
    latest: BandwidthReport,
    peak_uplink_kbps: Option<f64>,
    peak_downlink_kbps: Option<f64>,
}

impl StatsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a report and return the derived bandwidth view.
    pub fn record(&mut self, report: &ClientMetricReport) -> BandwidthReport {
        let bandwidth = BandwidthReport::from_report(report);
        self.samples += 1;
        self.latest = bandwidth;
        self.peak_uplink_kbps = max_known(self.peak_uplink_kbps, bandwidth.uplink_kbps);
        self.peak_downlink_kbps = max_known(self.peak_downlink_kbps, bandwidth.downlink_kbps);
        trace!(
            target: "client.session",
            uplink_kbps = ?bandwidth.uplink_kbps,
            downlink_kbps = ?bandwidth.downlink_kbps,
            "Metrics received"
        );
        bandwidth
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples
    }

    #[must_use]
    pub fn latest(&self) -> BandwidthReport {
        self.latest
    }

    #[must_use]
    pub fn peak_uplink_kbps(&self) -> Option<f64> {
        self.peak_uplink_kbps
    }

    #[must_use]
    pub fn peak_downlink_kbps(&self) -> Option<f64> {
        self.peak_downlink_kbps
    }
}

fn max_known(current: Option<f64>, sample: Option<f64>) -> Option<f64> {
    match (current, sample) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
