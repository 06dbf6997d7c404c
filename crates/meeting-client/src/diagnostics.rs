//! Diagnostic event filtering.
//!
//! Session events carry an optional `meetingHistory` attribute listing every
//! earlier event. Before forwarding to the log sink:
//! - success events drop the history entirely
//! - failure events keep only history entries from the trailing
//!   [`HISTORY_WINDOW_MS`]
//! - every other event is logged locally and not forwarded

use crate::observability::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Trailing window of history kept on failure events, in milliseconds.
pub const HISTORY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Session event names the filter distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventName {
    MeetingStartRequested,
    MeetingStartSucceeded,
    MeetingEnded,
    AudioInputFailed,
    VideoInputFailed,
    MeetingStartFailed,
    MeetingFailed,
    Other(String),
}

impl EventName {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "meetingStartRequested" => EventName::MeetingStartRequested,
            "meetingStartSucceeded" => EventName::MeetingStartSucceeded,
            "meetingEnded" => EventName::MeetingEnded,
            "audioInputFailed" => EventName::AudioInputFailed,
            "videoInputFailed" => EventName::VideoInputFailed,
            "meetingStartFailed" => EventName::MeetingStartFailed,
            "meetingFailed" => EventName::MeetingFailed,
            other => EventName::Other(other.to_string()),
        }
    }

    fn class(&self) -> EventClass {
        match self {
            EventName::MeetingStartRequested
            | EventName::MeetingStartSucceeded
            | EventName::MeetingEnded => EventClass::Success,
            EventName::AudioInputFailed
            | EventName::VideoInputFailed
            | EventName::MeetingStartFailed
            | EventName::MeetingFailed => EventClass::Failure,
            EventName::Other(_) => EventClass::LocalOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventClass {
    Success,
    Failure,
    LocalOnly,
}

/// One earlier event in `meetingHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub name: String,
    pub timestamp_ms: i64,
}

/// Event attributes. Only the history is interpreted; everything else
/// passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_history: Option<Vec<HistoryEntry>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A generic session event from the facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub name: String,
    pub attributes: EventAttributes,
}

/// Destination for forwarded events.
pub trait DiagnosticSink: Send + Sync {
    fn forward(&self, event: DiagnosticEvent);
}

/// Sink that hands events to a bounded channel; drops on a full or closed
/// channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<DiagnosticEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: mpsc::Sender<DiagnosticEvent>) -> Self {
        Self { sender }
    }
}

impl DiagnosticSink for ChannelSink {
    fn forward(&self, event: DiagnosticEvent) {
        if let Err(e) = self.sender.try_send(event) {
            warn!(target: "client.diagnostics", error = %e, "Diagnostic event dropped");
        }
    }
}

/// What the filter did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Forwarded without history.
    ForwardedStripped,
    /// Forwarded with `kept` recent history entries.
    ForwardedRecent { kept: usize },
    LocalOnly,
}

/// Reshapes session events and forwards the interesting ones.
pub struct DiagnosticEventFilter {
    sink: Arc<dyn DiagnosticSink>,
}

impl DiagnosticEventFilter {
    #[must_use]
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    /// Filter one event against `now`.
    pub fn on_event(&self, mut event: DiagnosticEvent, now: DateTime<Utc>) -> FilterDecision {
        match EventName::parse(&event.name).class() {
            EventClass::Success => {
                event.attributes.meeting_history = None;
                info!(target: "client.diagnostics", event = %event.name, "Forwarding session event");
                self.sink.forward(event);
                metrics::record_diagnostic_event("forwarded_success");
                FilterDecision::ForwardedStripped
            }
            EventClass::Failure => {
                let cutoff = now.timestamp_millis() - HISTORY_WINDOW_MS;
                let kept = match event.attributes.meeting_history.as_mut() {
                    Some(history) => {
                        history.retain(|entry| entry.timestamp_ms > cutoff);
                        history.len()
                    }
                    None => 0,
                };
                warn!(
                    target: "client.diagnostics",
                    event = %event.name,
                    history_kept = kept,
                    "Forwarding failure event"
                );
                self.sink.forward(event);
                metrics::record_diagnostic_event("forwarded_failure");
                FilterDecision::ForwardedRecent { kept }
            }
            EventClass::LocalOnly => {
                debug!(
                    target: "client.diagnostics",
                    event = %event.name,
                    attributes = ?event.attributes.other,
                    "Session event"
                );
                metrics::record_diagnostic_event("local_only");
                FilterDecision::LocalOnly
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn filter() -> (DiagnosticEventFilter, mpsc::Receiver<DiagnosticEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (DiagnosticEventFilter::new(Arc::new(ChannelSink::new(tx))), rx)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn minutes_ago(minutes: i64) -> i64 {
        (now() - chrono::Duration::minutes(minutes)).timestamp_millis()
    }

    fn event(name: &str, history: &[(&str, i64)]) -> DiagnosticEvent {
        DiagnosticEvent {
            name: name.to_string(),
            attributes: EventAttributes {
                meeting_history: Some(
                    history
                        .iter()
                        .map(|(name, ts)| HistoryEntry {
                            name: (*name).to_string(),
                            timestamp_ms: *ts,
                        })
                        .collect(),
                ),
                other: Map::new(),
            },
        }
    }

    #[test]
    fn test_failure_event_keeps_recent_history_only() {
        let (filter, mut rx) = filter();
        let e = event(
            "meetingFailed",
            &[("audioInputSelected", minutes_ago(6)), ("signalingDropped", minutes_ago(2))],
        );

        assert_eq!(filter.on_event(e, now()), FilterDecision::ForwardedRecent { kept: 1 });

        let forwarded = rx.try_recv().unwrap();
        let history = forwarded.attributes.meeting_history.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.first().unwrap().name, "signalingDropped");
    }

    #[test]
    fn test_entry_exactly_at_window_edge_is_dropped() {
        let (filter, mut rx) = filter();
        let e = event("audioInputFailed", &[("a", minutes_ago(5)), ("b", minutes_ago(5) + 1)]);

        assert_eq!(filter.on_event(e, now()), FilterDecision::ForwardedRecent { kept: 1 });
        let history = rx.try_recv().unwrap().attributes.meeting_history.unwrap();
        assert_eq!(history.first().unwrap().name, "b");
    }

    #[test]
    fn test_success_event_strips_history() {
        let (filter, mut rx) = filter();
        let mut e = event("meetingStartSucceeded", &[("meetingStartRequested", minutes_ago(1))]);
        e.attributes.other.insert("maxVideoTileCount".to_string(), json!(4));

        assert_eq!(filter.on_event(e, now()), FilterDecision::ForwardedStripped);

        let forwarded = rx.try_recv().unwrap();
        assert!(forwarded.attributes.meeting_history.is_none());
        assert_eq!(forwarded.attributes.other.get("maxVideoTileCount"), Some(&json!(4)));
    }

    #[test]
    fn test_other_events_are_not_forwarded() {
        let (filter, mut rx) = filter();
        let e = event("attendeePresenceReceived", &[("x", minutes_ago(1))]);

        assert_eq!(filter.on_event(e, now()), FilterDecision::LocalOnly);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failure_without_history_forwards() {
        let (filter, mut rx) = filter();
        let e = DiagnosticEvent {
            name: "videoInputFailed".to_string(),
            attributes: EventAttributes::default(),
        };

        assert_eq!(filter.on_event(e, now()), FilterDecision::ForwardedRecent { kept: 0 });
        assert!(rx.try_recv().unwrap().attributes.meeting_history.is_none());
    }

    #[test]
    fn test_attributes_wire_shape() {
        let raw = json!({
            "name": "meetingFailed",
            "attributes": {
                "meetingStatus": "TaskFailed",
                "meetingHistory": [{"name": "meetingStartRequested", "timestampMs": 1000}]
            }
        });
        let event: DiagnosticEvent = serde_json::from_value(raw).unwrap();

        assert_eq!(event.attributes.meeting_history.as_ref().unwrap().len(), 1);
        assert_eq!(
            event.attributes.other.get("meetingStatus"),
            Some(&json!("TaskFailed"))
        );
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(
            back.pointer("/attributes/meetingHistory/0/timestampMs"),
            Some(&json!(1000))
        );
    }

    #[test]
    fn test_full_sink_drops_without_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let filter = DiagnosticEventFilter::new(Arc::new(ChannelSink::new(tx)));
        filter.on_event(event("meetingEnded", &[]), now());
        assert_eq!(
            filter.on_event(event("meetingEnded", &[]), now()),
            FilterDecision::ForwardedStripped
        );
    }
}
