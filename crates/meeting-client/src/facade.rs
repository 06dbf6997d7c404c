//! Seam to the external audio/video session facade.
//!
//! The facade owns media transport, device capture and bandwidth estimation.
//! The client drives it through [`AudioVideoFacade`] and receives every
//! callback as a [`FacadeEvent`] through an [`EventSink`], so all handlers run
//! on the session actor rather than on facade threads.

use crate::audio_meter::WaveformSource;
use crate::config::ClientConfig;
use crate::devices::{AudioInputSelection, AudioOutputSelection, MediaDevice};
use crate::diagnostics::DiagnosticEvent;
use crate::errors::ClientError;
use async_trait::async_trait;
use common::provisioning::{JoinInfo, MediaPlacement};
use common::secret::SecretString;
use common::types::{AttendeeId, MeetingId, TileId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Everything the facade needs to connect one attendee to one meeting.
#[derive(Debug, Clone)]
pub struct MeetingSessionConfiguration {
    pub meeting_id: MeetingId,
    pub attendee_id: AttendeeId,
    pub external_user_id: String,
    pub media_region: String,
    pub media_placement: MediaPlacement,
    pub join_token: SecretString,
    pub attendee_presence_timeout: Duration,
    pub enable_simulcast: bool,
}

impl MeetingSessionConfiguration {
    #[must_use]
    pub fn new(join_info: &JoinInfo, config: &ClientConfig) -> Self {
        let meeting = &join_info.meeting.meeting;
        let attendee = &join_info.attendee.attendee;
        Self {
            meeting_id: meeting.meeting_id.clone(),
            attendee_id: attendee.attendee_id.clone(),
            external_user_id: attendee.external_user_id.clone(),
            media_region: meeting.media_region.clone(),
            media_placement: meeting.media_placement.clone(),
            join_token: attendee.join_token.clone(),
            attendee_presence_timeout: config.presence_timeout,
            enable_simulcast: config.enable_simulcast,
        }
    }
}

/// Tuning for the facade's active speaker detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSpeakerPolicy {
    pub speaker_weight: f64,
    pub cutoff_threshold: f64,
    pub silence_threshold: f64,
    pub takeover_rate: f64,
}

impl Default for ActiveSpeakerPolicy {
    fn default() -> Self {
        Self {
            speaker_weight: 0.9,
            cutoff_threshold: 0.01,
            silence_threshold: 0.2,
            takeover_rate: 0.2,
        }
    }
}

/// State of a video tile as reported by the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileState {
    pub tile_id: TileId,
    /// Attendee whose stream the tile shows; `None` until bound.
    pub bound_attendee_id: Option<AttendeeId>,
    pub local_tile: bool,
    pub is_content: bool,
    pub paused: bool,
}

/// Observable connection metrics. Bandwidths are in bits per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClientMetricReport {
    pub available_send_bandwidth: Option<f64>,
    pub available_outgoing_bitrate: Option<f64>,
    pub available_receive_bandwidth: Option<f64>,
    pub available_incoming_bitrate: Option<f64>,
}

/// Reason the facade reports for a stopped session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatusCode {
    /// The local attendee left.
    Left,
    /// The meeting was ended for everyone.
    AudioCallEnded,
    AudioJoinedFromAnotherDevice,
    AudioDisconnectAudio,
    AudioCallAtCapacity,
    ConnectionHealthReconnect,
    SignalingBadRequest,
    SignalingInternalServerError,
    SignalingRequestFailed,
    RealtimeApiFailed,
    TaskFailed,
    NoAttendeePresent,
}

impl SessionStatusCode {
    /// Terminal codes send the UI back to the authenticate flow; everything
    /// else leaves it in place so the user can retry.
    #[must_use]
    pub fn classify(self) -> StopDisposition {
        match self {
            SessionStatusCode::Left | SessionStatusCode::AudioCallEnded => {
                StopDisposition::FullReset
            }
            _ => StopDisposition::SoftRecovery,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatusCode::Left => "left",
            SessionStatusCode::AudioCallEnded => "audio_call_ended",
            SessionStatusCode::AudioJoinedFromAnotherDevice => "audio_joined_from_another_device",
            SessionStatusCode::AudioDisconnectAudio => "audio_disconnect_audio",
            SessionStatusCode::AudioCallAtCapacity => "audio_call_at_capacity",
            SessionStatusCode::ConnectionHealthReconnect => "connection_health_reconnect",
            SessionStatusCode::SignalingBadRequest => "signaling_bad_request",
            SessionStatusCode::SignalingInternalServerError => "signaling_internal_server_error",
            SessionStatusCode::SignalingRequestFailed => "signaling_request_failed",
            SessionStatusCode::RealtimeApiFailed => "realtime_api_failed",
            SessionStatusCode::TaskFailed => "task_failed",
            SessionStatusCode::NoAttendeePresent => "no_attendee_present",
        }
    }
}

/// What a stopped session means for the UI flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDisposition {
    FullReset,
    SoftRecovery,
}

impl StopDisposition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StopDisposition::FullReset => "full_reset",
            StopDisposition::SoftRecovery => "soft_recovery",
        }
    }
}

/// A facade callback.
#[derive(Debug, Clone, PartialEq)]
pub enum FacadeEvent {
    AttendeePresence {
        attendee_id: AttendeeId,
        present: bool,
        external_user_id: String,
        dropped: bool,
    },
    /// Normalized `[0, 1]` readings; `None` means unchanged.
    VolumeIndicator {
        attendee_id: AttendeeId,
        volume: Option<f64>,
        muted: Option<bool>,
        signal_strength: Option<f64>,
    },
    /// Attendees ordered by speaking activity, most active first.
    ActiveSpeakers(Vec<AttendeeId>),
    ActiveSpeakerScores(HashMap<AttendeeId, f64>),
    LocalMuteChanged(bool),
    CanUnmuteChanged(bool),
    VideoTileUpdated(TileState),
    VideoTileRemoved(TileId),
    Metrics(ClientMetricReport),
    /// Generic session event for the diagnostic filter.
    SessionEvent(DiagnosticEvent),
    StartConnecting {
        reconnecting: bool,
    },
    Started,
    Stopped(SessionStatusCode),
    ConnectionPoor,
    ConnectionGood,
    ConnectionSuggestStopVideo,
    DownlinkBandwidthInsufficient {
        estimated_kbps: f64,
        required_kbps: f64,
    },
    AudioInputStreamEnded {
        device_id: String,
    },
    AudioInputsChanged(Vec<MediaDevice>),
    AudioOutputsChanged(Vec<MediaDevice>),
}

/// Delivery handle the facade uses for callbacks.
///
/// Emitting never blocks the facade: if the session mailbox is full or
/// closed the event is dropped with a warning.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::Sender<FacadeEvent>,
}

impl EventSink {
    #[must_use]
    pub fn new(sender: mpsc::Sender<FacadeEvent>) -> Self {
        Self { sender }
    }

    /// Deliver an event. Returns false if it was dropped.
    pub fn emit(&self, event: FacadeEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(target: "client.session", event = ?event, "Session mailbox full, dropping facade event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Capability set the client consumes from the session facade.
#[async_trait]
pub trait AudioVideoFacade: Send + Sync {
    /// Prepare a session for the given meeting and attendee.
    async fn initialize(&self, configuration: &MeetingSessionConfiguration) -> Result<(), ClientError>;

    async fn start(&self) -> Result<(), ClientError>;

    async fn stop(&self) -> Result<(), ClientError>;

    async fn list_audio_input_devices(&self) -> Result<Vec<MediaDevice>, ClientError>;

    async fn list_audio_output_devices(&self) -> Result<Vec<MediaDevice>, ClientError>;

    async fn choose_audio_input_device(&self, selection: AudioInputSelection) -> Result<(), ClientError>;

    async fn choose_audio_output_device(&self, selection: AudioOutputSelection) -> Result<(), ClientError>;

    fn subscribe_to_attendee_presence(&self, sink: EventSink);

    fn subscribe_to_volume_indicator(&self, attendee_id: &AttendeeId, sink: EventSink);

    fn unsubscribe_from_volume_indicator(&self, attendee_id: &AttendeeId);

    /// `score_interval` of zero disables score delivery.
    fn subscribe_to_active_speaker_detector(
        &self,
        policy: ActiveSpeakerPolicy,
        sink: EventSink,
        score_interval: Duration,
    );

    fn subscribe_to_mute_state(&self, sink: EventSink);

    /// Lifecycle, tile, metrics, generic event and device change callbacks.
    fn add_observer(&self, sink: EventSink);

    /// Waveform analyser for the current audio input, if there is one.
    fn create_audio_input_analyser(&self) -> Option<Box<dyn WaveformSource>>;
}
