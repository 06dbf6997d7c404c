//! Scriptable audio/video facade.
//!
//! Records every call the client makes and keeps the sinks it was handed, so
//! tests can play facade callbacks back into a running session:
//!
//! ```rust,ignore
//! let facade = MockFacade::new().stop_reports(SessionStatusCode::Left);
//! // ... authenticate + join through a controller ...
//! facade.emit_presence(&attendee("a1"), true, "0a1b2c3d#Bob", false);
//! assert!(facade.is_volume_subscribed(&attendee("a1")));
//! ```

use async_trait::async_trait;
use common::types::AttendeeId;
use meeting_client::audio_meter::WaveformSource;
use meeting_client::devices::{AudioInputSelection, AudioOutputSelection, MediaDevice};
use meeting_client::errors::ClientError;
use meeting_client::facade::{
    ActiveSpeakerPolicy, AudioVideoFacade, EventSink, FacadeEvent, MeetingSessionConfiguration,
    SessionStatusCode,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::waveform::ScriptedWaveform;

#[derive(Default)]
struct MockFacadeInner {
    // Behaviour
    input_devices: Vec<MediaDevice>,
    output_devices: Vec<MediaDevice>,
    fail_start: bool,
    fail_device_choice: bool,
    fail_device_listing: bool,
    stop_code: Option<SessionStatusCode>,
    waveform: Option<ScriptedWaveform>,

    // Recorded calls
    configurations: Vec<MeetingSessionConfiguration>,
    start_calls: usize,
    stop_calls: usize,
    chosen_inputs: Vec<AudioInputSelection>,
    chosen_outputs: Vec<AudioOutputSelection>,
    analysers_created: usize,
    speaker_policy: Option<ActiveSpeakerPolicy>,
    score_interval: Option<Duration>,

    // Subscriptions
    presence: Vec<EventSink>,
    speakers: Vec<EventSink>,
    mute: Vec<EventSink>,
    observers: Vec<EventSink>,
    volume: HashMap<AttendeeId, EventSink>,
    volume_subscribe_calls: usize,
}

/// Mock facade for controller and session tests.
#[derive(Clone, Default)]
pub struct MockFacade {
    inner: Arc<Mutex<MockFacadeInner>>,
}

impl MockFacade {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_input_devices(self, devices: Vec<MediaDevice>) -> Self {
        self.inner.lock().unwrap().input_devices = devices;
        self
    }

    #[must_use]
    pub fn with_output_devices(self, devices: Vec<MediaDevice>) -> Self {
        self.inner.lock().unwrap().output_devices = devices;
        self
    }

    /// `start` fails with a facade error.
    #[must_use]
    pub fn failing_start(self) -> Self {
        self.inner.lock().unwrap().fail_start = true;
        self
    }

    /// Device choices fail with a facade error.
    #[must_use]
    pub fn failing_device_choice(self) -> Self {
        self.inner.lock().unwrap().fail_device_choice = true;
        self
    }

    /// Device enumeration fails.
    #[must_use]
    pub fn failing_device_listing(self) -> Self {
        self.inner.lock().unwrap().fail_device_listing = true;
        self
    }

    /// `stop` reports a `Stopped` callback with `code`, as a real session does.
    #[must_use]
    pub fn stop_reports(self, code: SessionStatusCode) -> Self {
        self.inner.lock().unwrap().stop_code = Some(code);
        self
    }

    /// Analyser handed to the audio meter.
    #[must_use]
    pub fn with_waveform(self, waveform: ScriptedWaveform) -> Self {
        self.inner.lock().unwrap().waveform = Some(waveform);
        self
    }

    pub fn set_fail_device_choice(&self, fail: bool) {
        self.inner.lock().unwrap().fail_device_choice = fail;
    }

    // ---- playback ----

    fn broadcast(sinks: &[EventSink], event: &FacadeEvent) -> bool {
        let mut delivered = false;
        for sink in sinks {
            delivered |= sink.emit(event.clone());
        }
        delivered
    }

    /// Deliver a presence callback to presence subscribers.
    pub fn emit_presence(
        &self,
        attendee_id: &AttendeeId,
        present: bool,
        external_user_id: &str,
        dropped: bool,
    ) -> bool {
        let sinks = self.inner.lock().unwrap().presence.clone();
        Self::broadcast(
            &sinks,
            &FacadeEvent::AttendeePresence {
                attendee_id: attendee_id.clone(),
                present,
                external_user_id: external_user_id.to_string(),
                dropped,
            },
        )
    }

    /// Deliver a volume callback, only if a subscription exists for
    /// `attendee_id`. Returns whether it was delivered.
    pub fn emit_volume(
        &self,
        attendee_id: &AttendeeId,
        volume: Option<f64>,
        muted: Option<bool>,
        signal_strength: Option<f64>,
    ) -> bool {
        let sink = self.inner.lock().unwrap().volume.get(attendee_id).cloned();
        sink.is_some_and(|sink| {
            sink.emit(FacadeEvent::VolumeIndicator {
                attendee_id: attendee_id.clone(),
                volume,
                muted,
                signal_strength,
            })
        })
    }

    /// Deliver a volume callback regardless of subscriptions (a late event).
    pub fn emit_volume_unsolicited(
        &self,
        attendee_id: &AttendeeId,
        volume: Option<f64>,
        muted: Option<bool>,
        signal_strength: Option<f64>,
    ) -> bool {
        let sinks = self.inner.lock().unwrap().presence.clone();
        Self::broadcast(
            &sinks,
            &FacadeEvent::VolumeIndicator {
                attendee_id: attendee_id.clone(),
                volume,
                muted,
                signal_strength,
            },
        )
    }

    pub fn emit_active_speakers(&self, ranked: Vec<AttendeeId>) -> bool {
        let sinks = self.inner.lock().unwrap().speakers.clone();
        Self::broadcast(&sinks, &FacadeEvent::ActiveSpeakers(ranked))
    }

    pub fn emit_scores(&self, scores: HashMap<AttendeeId, f64>) -> bool {
        let sinks = self.inner.lock().unwrap().speakers.clone();
        Self::broadcast(&sinks, &FacadeEvent::ActiveSpeakerScores(scores))
    }

    pub fn emit_local_mute(&self, muted: bool) -> bool {
        let sinks = self.inner.lock().unwrap().mute.clone();
        Self::broadcast(&sinks, &FacadeEvent::LocalMuteChanged(muted))
    }

    /// Deliver an observer callback (lifecycle, tiles, metrics, events,
    /// device changes).
    pub fn emit_observer(&self, event: FacadeEvent) -> bool {
        let sinks = self.inner.lock().unwrap().observers.clone();
        Self::broadcast(&sinks, &event)
    }

    // ---- inspection ----

    #[must_use]
    pub fn initialize_count(&self) -> usize {
        self.inner.lock().unwrap().configurations.len()
    }

    #[must_use]
    pub fn last_configuration(&self) -> Option<MeetingSessionConfiguration> {
        self.inner.lock().unwrap().configurations.last().cloned()
    }

    #[must_use]
    pub fn start_count(&self) -> usize {
        self.inner.lock().unwrap().start_calls
    }

    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.inner.lock().unwrap().stop_calls
    }

    #[must_use]
    pub fn chosen_inputs(&self) -> Vec<AudioInputSelection> {
        self.inner.lock().unwrap().chosen_inputs.clone()
    }

    #[must_use]
    pub fn chosen_outputs(&self) -> Vec<AudioOutputSelection> {
        self.inner.lock().unwrap().chosen_outputs.clone()
    }

    #[must_use]
    pub fn analysers_created(&self) -> usize {
        self.inner.lock().unwrap().analysers_created
    }

    #[must_use]
    pub fn is_volume_subscribed(&self, attendee_id: &AttendeeId) -> bool {
        self.inner.lock().unwrap().volume.contains_key(attendee_id)
    }

    #[must_use]
    pub fn volume_subscription_count(&self) -> usize {
        self.inner.lock().unwrap().volume.len()
    }

    /// Total `subscribe_to_volume_indicator` calls, including repeats.
    #[must_use]
    pub fn volume_subscribe_calls(&self) -> usize {
        self.inner.lock().unwrap().volume_subscribe_calls
    }

    #[must_use]
    pub fn speaker_policy(&self) -> Option<ActiveSpeakerPolicy> {
        self.inner.lock().unwrap().speaker_policy
    }

    #[must_use]
    pub fn score_interval(&self) -> Option<Duration> {
        self.inner.lock().unwrap().score_interval
    }

    /// Number of sessions that subscribed as observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.lock().unwrap().observers.len()
    }

    fn device_error(&self, what: &str) -> Result<(), ClientError> {
        if self.inner.lock().unwrap().fail_device_choice {
            Err(ClientError::Facade(format!("{what} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AudioVideoFacade for MockFacade {
    async fn initialize(&self, configuration: &MeetingSessionConfiguration) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.configurations.push(configuration.clone());
        // A new session replaces the previous one's subscriptions
        inner.presence.clear();
        inner.speakers.clear();
        inner.mute.clear();
        inner.observers.clear();
        inner.volume.clear();
        Ok(())
    }

    async fn start(&self) -> Result<(), ClientError> {
        let observers = {
            let mut inner = self.inner.lock().unwrap();
            inner.start_calls += 1;
            if inner.fail_start {
                return Err(ClientError::Facade("start failed".to_string()));
            }
            inner.observers.clone()
        };
        Self::broadcast(&observers, &FacadeEvent::StartConnecting { reconnecting: false });
        Self::broadcast(&observers, &FacadeEvent::Started);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ClientError> {
        let (observers, code) = {
            let mut inner = self.inner.lock().unwrap();
            inner.stop_calls += 1;
            (inner.observers.clone(), inner.stop_code)
        };
        if let Some(code) = code {
            Self::broadcast(&observers, &FacadeEvent::Stopped(code));
        }
        Ok(())
    }

    async fn list_audio_input_devices(&self) -> Result<Vec<MediaDevice>, ClientError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_device_listing {
            return Err(ClientError::UnsupportedCapability("enumeration denied".to_string()));
        }
        Ok(inner.input_devices.clone())
    }

    async fn list_audio_output_devices(&self) -> Result<Vec<MediaDevice>, ClientError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_device_listing {
            return Err(ClientError::UnsupportedCapability("enumeration denied".to_string()));
        }
        Ok(inner.output_devices.clone())
    }

    async fn choose_audio_input_device(&self, selection: AudioInputSelection) -> Result<(), ClientError> {
        self.device_error("microphone")?;
        self.inner.lock().unwrap().chosen_inputs.push(selection);
        Ok(())
    }

    async fn choose_audio_output_device(&self, selection: AudioOutputSelection) -> Result<(), ClientError> {
        self.device_error("speaker")?;
        self.inner.lock().unwrap().chosen_outputs.push(selection);
        Ok(())
    }

    fn subscribe_to_attendee_presence(&self, sink: EventSink) {
        self.inner.lock().unwrap().presence.push(sink);
    }

    fn subscribe_to_volume_indicator(&self, attendee_id: &AttendeeId, sink: EventSink) {
        let mut inner = self.inner.lock().unwrap();
        inner.volume_subscribe_calls += 1;
        inner.volume.insert(attendee_id.clone(), sink);
    }

    fn unsubscribe_from_volume_indicator(&self, attendee_id: &AttendeeId) {
        self.inner.lock().unwrap().volume.remove(attendee_id);
    }

    fn subscribe_to_active_speaker_detector(
        &self,
        policy: ActiveSpeakerPolicy,
        sink: EventSink,
        score_interval: Duration,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.speaker_policy = Some(policy);
        inner.score_interval = Some(score_interval);
        inner.speakers.push(sink);
    }

    fn subscribe_to_mute_state(&self, sink: EventSink) {
        self.inner.lock().unwrap().mute.push(sink);
    }

    fn add_observer(&self, sink: EventSink) {
        self.inner.lock().unwrap().observers.push(sink);
    }

    fn create_audio_input_analyser(&self) -> Option<Box<dyn WaveformSource>> {
        let mut inner = self.inner.lock().unwrap();
        inner.analysers_created += 1;
        inner
            .waveform
            .clone()
            .map(|waveform| Box::new(waveform) as Box<dyn WaveformSource>)
    }
}
