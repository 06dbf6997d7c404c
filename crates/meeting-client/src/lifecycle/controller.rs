//! Meeting lifecycle controller.
//!
//! Drives authenticate -> join -> leave/end against the provisioning service
//! and the session facade. The controller owns at most one session at a time:
//! the session actor, the audio meter, the fault monitor and the current
//! device selection.

use super::controls::{ControlButton, ControlPanel, TransitionOutcome};
use super::faults::AsyncFaultMonitor;
use super::state::{Lifecycle, LifecycleState};
use crate::audio_meter::{AudioLevelMeter, MeterStatus};
use crate::config::{ClientConfig, ParticipantRole, RECORDER_DISPLAY_NAME};
use crate::devices::{AudioInputSelection, AudioOutputSelection, DeviceLists, MediaDevice};
use crate::diagnostics::DiagnosticSink;
use crate::errors::ClientError;
use crate::facade::{
    ActiveSpeakerPolicy, AudioVideoFacade, EventSink, MeetingSessionConfiguration,
};
use crate::provisioning::{JoinFlights, JoinRequest, MediaRegions, ProvisioningClient};
use crate::roster::RosterSnapshot;
use crate::session::{
    BandwidthReport, SessionActor, SessionHandle, SessionNotification, SessionSettings,
    SessionViews, StatsCollector,
};
use crate::tiles::SlotSnapshot;
use common::types::MeetingId;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Shown before ending the meeting when confirmation is enabled.
pub const END_CONFIRMATION_PROMPT: &str = "Are you sure you want to end the meeting for everyone? The meeting cannot be used after ending it.";

struct ActiveSession {
    title: String,
    meeting_id: MeetingId,
    handle: SessionHandle,
    task: JoinHandle<()>,
    /// Cancelled by the session actor on a full reset, which stops the meter
    /// and the fault monitor without waiting for the next `authenticate`.
    media_scope: CancellationToken,
    faults: Option<AsyncFaultMonitor>,
    meter: Option<AudioLevelMeter>,
    input: AudioInputSelection,
    output: AudioOutputSelection,
}

/// Orchestrates one participant's meeting lifecycle.
pub struct MeetingController {
    config: ClientConfig,
    provisioning: Arc<dyn ProvisioningClient>,
    facade: Arc<dyn AudioVideoFacade>,
    diagnostics: Arc<dyn DiagnosticSink>,
    lifecycle: Lifecycle,
    controls: ControlPanel,
    flights: JoinFlights,
    regions: watch::Sender<MediaRegions>,
    views: Arc<SessionViews>,
    session: Mutex<Option<ActiveSession>>,
}

impl MeetingController {
    #[must_use]
    pub fn new(
        config: ClientConfig,
        provisioning: Arc<dyn ProvisioningClient>,
        facade: Arc<dyn AudioVideoFacade>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let (regions, _) = watch::channel(MediaRegions::new(
            config.supported_regions.clone(),
            config.region.clone(),
        ));
        Self {
            config,
            provisioning,
            facade,
            diagnostics,
            lifecycle: Lifecycle::new(),
            controls: ControlPanel::new(),
            flights: JoinFlights::new(),
            regions,
            views: Arc::new(SessionViews::new()),
            session: Mutex::new(None),
        }
    }

    /// Obtain credentials for `title` and initialize the facade.
    ///
    /// Concurrent calls for one title share a single provisioning request and
    /// end up on the same session; a call made after another one for the same
    /// title completed returns that session's meeting. Authenticating for a
    /// different title before `join` replaces the pending session.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidTransition` if a meeting for another title is
    ///   already joined
    /// - `ClientError::Provisioning` if the join request fails
    /// - `ClientError::Facade` if the facade rejects the configuration
    #[instrument(skip_all, fields(title = %title))]
    pub async fn authenticate(&self, title: &str, name: &str) -> Result<MeetingId, ClientError> {
        let name = if matches!(self.config.role, ParticipantRole::Recorder) {
            RECORDER_DISPLAY_NAME
        } else {
            name
        };

        self.discard_stale_session().await;
        if let Some(meeting_id) = self.open_session_for(title).await {
            debug!(target: "client.lifecycle", meeting_id = %meeting_id, "Reusing authenticated session");
            return Ok(meeting_id);
        }
        self.lifecycle.transition(LifecycleState::Authenticating)?;

        match self.open_session(title, name).await {
            Ok(meeting_id) => Ok(meeting_id),
            Err(e) => {
                warn!(target: "client.lifecycle", error = %e, "Authentication failed");
                // A session for another title survives a failed join request
                let fallback = if self.session.lock().await.is_some() {
                    LifecycleState::Authenticated
                } else {
                    LifecycleState::Idle
                };
                self.lifecycle
                    .transition_if(&[LifecycleState::Authenticating], fallback);
                Err(e)
            }
        }
    }

    /// Meeting of the live session for `title`, if there is one.
    async fn open_session_for(&self, title: &str) -> Option<MeetingId> {
        let slot = self.session.lock().await;
        slot.as_ref()
            .filter(|session| session.title == title && self.lifecycle.current().is_in_meeting())
            .map(|session| session.meeting_id.clone())
    }

    async fn open_session(&self, title: &str, name: &str) -> Result<MeetingId, ClientError> {
        let request = JoinRequest {
            title: title.to_string(),
            name: name.to_string(),
            region: self.regions.borrow().selected().to_string(),
        };
        let info = self.flights.join(self.provisioning.as_ref(), &request).await?;
        let meeting_id = info.meeting_id().clone();

        let mut slot = self.session.lock().await;
        if let Some(existing) = slot.as_ref() {
            if existing.meeting_id == meeting_id {
                debug!(target: "client.lifecycle", meeting_id = %meeting_id, "Session already open");
                self.lifecycle
                    .transition_if(&[LifecycleState::Authenticating], LifecycleState::Authenticated);
                return Ok(meeting_id);
            }
        }
        if let Some(previous) = slot.take() {
            self.teardown(previous).await;
        }

        let configuration = MeetingSessionConfiguration::new(&info, &self.config);
        self.facade.initialize(&configuration).await?;

        let media_scope = CancellationToken::new();
        let settings = SessionSettings {
            meeting_id: meeting_id.clone(),
            local_attendee_id: info.attendee_id().clone(),
            speaker_policy: ActiveSpeakerPolicy::default(),
            score_interval: self.config.speaker_score_interval(),
            media_scope: media_scope.clone(),
        };
        let (handle, task) = SessionActor::spawn(
            Arc::clone(&self.facade),
            Arc::clone(&self.views),
            self.lifecycle.clone(),
            Arc::clone(&self.diagnostics),
            settings,
            CancellationToken::new(),
        );

        let inputs = self.list_devices(true).await;
        let outputs = self.list_devices(false).await;
        handle.set_devices(inputs, outputs).await?;

        *slot = Some(ActiveSession {
            title: title.to_string(),
            meeting_id: meeting_id.clone(),
            handle,
            task,
            media_scope,
            faults: None,
            meter: None,
            input: AudioInputSelection::from_picker("", self.config.role),
            output: AudioOutputSelection::Default,
        });
        self.lifecycle
            .transition_if(&[LifecycleState::Authenticating], LifecycleState::Authenticated);
        drop(slot);

        info!(
            target: "client.lifecycle",
            meeting_id = %meeting_id,
            attendee_id = %info.attendee_id(),
            "Authenticated"
        );
        Ok(meeting_id)
    }

    async fn list_devices(&self, inputs: bool) -> Vec<MediaDevice> {
        let listed = if inputs {
            self.facade.list_audio_input_devices().await
        } else {
            self.facade.list_audio_output_devices().await
        };
        listed.unwrap_or_else(|e| {
            warn!(target: "client.lifecycle", inputs, error = %e, "Device enumeration failed");
            Vec::new()
        })
    }

    /// A session left behind by a facade-initiated full reset.
    async fn discard_stale_session(&self) {
        if !matches!(
            self.lifecycle.current(),
            LifecycleState::Idle | LifecycleState::Terminated
        ) {
            return;
        }
        let stale = self.session.lock().await.take();
        if let Some(session) = stale {
            debug!(target: "client.lifecycle", meeting_id = %session.meeting_id, "Discarding stopped session");
            self.teardown(session).await;
        }
    }

    /// Open audio from the current selection and start the facade.
    ///
    /// # Errors
    ///
    /// - `ClientError::NoSession` before `authenticate`
    /// - `ClientError::InvalidTransition` if not authenticated
    /// - `ClientError::Facade` if a device or the facade fails to start
    #[instrument(skip_all)]
    pub async fn join(&self) -> Result<(), ClientError> {
        let mut slot = self.session.lock().await;
        let session = slot.as_mut().ok_or(ClientError::NoSession)?;
        self.lifecycle.transition(LifecycleState::Joining)?;

        // Rejoin after a soft recovery
        if let Some(previous) = session.faults.take() {
            previous.uninstall().await;
        }
        if let Some(mut meter) = session.meter.take() {
            meter.stop().await;
        }

        let faults = AsyncFaultMonitor::install(session.media_scope.child_token());
        if let Err(e) = self.start_media(session).await {
            warn!(target: "client.lifecycle", meeting_id = %session.meeting_id, error = %e, "Join failed");
            faults.uninstall().await;
            if let Some(mut meter) = session.meter.take() {
                meter.stop().await;
            }
            self.lifecycle
                .transition_if(&[LifecycleState::Joining], LifecycleState::Authenticated);
            return Err(e);
        }
        session.faults = Some(faults);

        self.lifecycle.transition(LifecycleState::Active)?;
        info!(target: "client.lifecycle", meeting_id = %session.meeting_id, "Joined meeting");
        Ok(())
    }

    async fn start_media(&self, session: &mut ActiveSession) -> Result<(), ClientError> {
        self.facade
            .choose_audio_input_device(session.input.clone())
            .await?;
        session.meter = self.start_meter(&session.input, &session.media_scope);
        self.facade
            .choose_audio_output_device(session.output.clone())
            .await?;
        self.facade.start().await
    }

    fn start_meter(
        &self,
        input: &AudioInputSelection,
        scope: &CancellationToken,
    ) -> Option<AudioLevelMeter> {
        if !self.config.role.captures_audio() || *input == AudioInputSelection::None {
            return None;
        }
        Some(AudioLevelMeter::start(
            self.facade.create_audio_input_analyser(),
            self.config.meter_frame_interval,
            scope.child_token(),
        ))
    }

    /// Leave the meeting.
    ///
    /// A no-op while another leave/end is running or when not in a meeting.
    ///
    /// # Errors
    ///
    /// Currently infallible; teardown failures are logged.
    #[instrument(skip_all)]
    pub async fn leave(&self) -> Result<TransitionOutcome, ClientError> {
        let Some(_guard) = self.controls.begin_transition() else {
            return Ok(TransitionOutcome::InProgress);
        };
        if self.lifecycle.transition(LifecycleState::Leaving).is_err() {
            debug!(target: "client.lifecycle", state = %self.lifecycle.current(), "Leave outside a meeting");
            return Ok(TransitionOutcome::NotInMeeting);
        }

        let session = self.session.lock().await.take();
        if let Some(session) = session {
            self.teardown(session).await;
        }
        self.lifecycle
            .transition_if(&[LifecycleState::Leaving], LifecycleState::Terminated);
        info!(target: "client.lifecycle", "Left meeting");
        Ok(TransitionOutcome::Completed)
    }

    /// End the meeting for everyone, then leave.
    ///
    /// With `confirm_end` set, `confirm` is asked first and a refusal
    /// returns `TransitionOutcome::Cancelled` without any request.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Provisioning` if the end request fails; the
    /// session is kept.
    #[instrument(skip_all)]
    pub async fn end(
        &self,
        confirm: impl FnOnce(&str) -> bool + Send,
    ) -> Result<TransitionOutcome, ClientError> {
        let Some(_guard) = self.controls.begin_transition() else {
            return Ok(TransitionOutcome::InProgress);
        };
        if !self.lifecycle.current().is_in_meeting() {
            return Ok(TransitionOutcome::NotInMeeting);
        }
        if self.config.confirm_end && !confirm(END_CONFIRMATION_PROMPT) {
            info!(target: "client.lifecycle", "End cancelled by user");
            return Ok(TransitionOutcome::Cancelled);
        }

        let title = match self.session.lock().await.as_ref() {
            Some(session) => session.title.clone(),
            None => return Ok(TransitionOutcome::NotInMeeting),
        };
        let Ok(previous) = self.lifecycle.transition(LifecycleState::Ending) else {
            return Ok(TransitionOutcome::NotInMeeting);
        };

        if let Err(e) = self.provisioning.end(&title).await {
            warn!(target: "client.lifecycle", title = %title, error = %e, "End request failed");
            self.lifecycle
                .transition_if(&[LifecycleState::Ending], previous);
            return Err(e);
        }
        info!(target: "client.lifecycle", title = %title, "Meeting ended for everyone");

        let session = self.session.lock().await.take();
        if let Some(session) = session {
            self.teardown(session).await;
        }
        self.lifecycle
            .transition_if(&[LifecycleState::Ending], LifecycleState::Terminated);
        Ok(TransitionOutcome::Completed)
    }

    async fn teardown(&self, mut session: ActiveSession) {
        if let Err(e) = session.handle.reset_stats().await {
            warn!(target: "client.lifecycle", error = %e, "Failed to reset statistics");
        }
        if let Err(e) = self.facade.stop().await {
            warn!(target: "client.lifecycle", error = %e, "Facade stop failed");
        }
        if let Err(e) = session.handle.clear_roster().await {
            warn!(target: "client.lifecycle", error = %e, "Failed to clear roster");
        }
        if let Some(mut meter) = session.meter.take() {
            meter.stop().await;
        }
        if let Some(faults) = session.faults.take() {
            faults.uninstall().await;
        }
        session.media_scope.cancel();

        session.handle.cancel();
        if let Err(e) = session.task.await {
            warn!(target: "client.lifecycle", error = %e, "Session task failed");
        }

        self.flights.forget(&session.title).await;
        self.controls.reset_buttons();
        debug!(target: "client.lifecycle", meeting_id = %session.meeting_id, "Session torn down");
    }

    /// Switch microphone. Applied immediately when in a meeting, otherwise
    /// on the next `join`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoSession` before `authenticate`. Facade
    /// failures are reported through the fault monitor.
    pub async fn select_audio_input(&self, value: &str) -> Result<AudioInputSelection, ClientError> {
        let selection = AudioInputSelection::from_picker(value, self.config.role);
        let mut slot = self.session.lock().await;
        let session = slot.as_mut().ok_or(ClientError::NoSession)?;
        session.input = selection.clone();
        info!(target: "client.lifecycle", input = %selection, "Audio input selected");

        if self.lifecycle.current() == LifecycleState::Active {
            if let Some(faults) = session.faults.as_ref() {
                let facade = Arc::clone(&self.facade);
                let chosen = selection.clone();
                faults
                    .spawn("choose_audio_input", async move {
                        facade.choose_audio_input_device(chosen).await
                    })
                    .await?;
            }
            if selection == AudioInputSelection::None {
                if let Some(mut meter) = session.meter.take() {
                    meter.stop().await;
                }
            } else if session.meter.is_none() {
                session.meter = self.start_meter(&selection, &session.media_scope);
            }
        }
        Ok(selection)
    }

    /// Switch speaker. Applied immediately when in a meeting, otherwise on
    /// the next `join`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoSession` before `authenticate`.
    pub async fn select_audio_output(&self, value: &str) -> Result<AudioOutputSelection, ClientError> {
        let selection = AudioOutputSelection::from_picker(value);
        let mut slot = self.session.lock().await;
        let session = slot.as_mut().ok_or(ClientError::NoSession)?;
        session.output = selection.clone();
        info!(target: "client.lifecycle", output = %selection, "Audio output selected");

        if self.lifecycle.current() == LifecycleState::Active {
            if let Some(faults) = session.faults.as_ref() {
                let facade = Arc::clone(&self.facade);
                let chosen = selection.clone();
                faults
                    .spawn("choose_audio_output", async move {
                        facade.choose_audio_output_device(chosen).await
                    })
                    .await?;
            }
        }
        Ok(selection)
    }

    /// Preselect the nearest media region unless one is pinned in
    /// configuration. A failed lookup keeps the current selection. Returns
    /// the region the next join request will use.
    #[instrument(skip_all)]
    pub async fn resolve_media_region(&self) -> String {
        if self.config.region_pinned {
            return self.regions.borrow().selected().to_string();
        }
        match self.provisioning.nearest_media_region().await {
            Ok(nearest) => {
                let mut outcome = Ok(false);
                self.regions.send_if_modified(|regions| {
                    let before = regions.clone();
                    outcome = regions.adopt_nearest(&nearest);
                    *regions != before
                });
                match outcome {
                    Ok(added) => {
                        info!(target: "client.lifecycle", region = %nearest, added, "Nearest media region selected");
                    }
                    Err(e) => {
                        info!(target: "client.lifecycle", error = %e, "Default media region selected");
                    }
                }
            }
            Err(e) => {
                info!(target: "client.lifecycle", error = %e, "Default media region selected");
            }
        }
        self.regions.borrow().selected().to_string()
    }

    /// Pick the media region for the next join request.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the region is not offered.
    pub fn select_media_region(&self, region: &str) -> Result<(), ClientError> {
        let mut outcome = Ok(());
        self.regions.send_if_modified(|regions| {
            outcome = regions.select(region);
            outcome.is_ok()
        });
        outcome
    }

    #[must_use]
    pub fn media_regions(&self) -> watch::Receiver<MediaRegions> {
        self.regions.subscribe()
    }

    /// Flip a meeting control toggle and return its new state. Toggles go
    /// back to their initial states when the session is torn down.
    pub fn toggle_control(&self, button: ControlButton) -> bool {
        let on = self.controls.toggle(button);
        debug!(target: "client.lifecycle", ?button, on, "Control toggled");
        on
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    #[must_use]
    pub fn controls(&self) -> &ControlPanel {
        &self.controls
    }

    #[must_use]
    pub fn roster(&self) -> watch::Receiver<RosterSnapshot> {
        self.views.roster()
    }

    #[must_use]
    pub fn slots(&self) -> watch::Receiver<SlotSnapshot> {
        self.views.slots()
    }

    #[must_use]
    pub fn bandwidth(&self) -> watch::Receiver<BandwidthReport> {
        self.views.bandwidth()
    }

    #[must_use]
    pub fn devices(&self) -> watch::Receiver<DeviceLists> {
        self.views.devices()
    }

    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<SessionNotification> {
        self.views.notifications()
    }

    /// Microphone level, if a meter is running.
    pub async fn audio_level(&self) -> Option<watch::Receiver<f64>> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|session| session.meter.as_ref())
            .map(AudioLevelMeter::subscribe)
    }

    pub async fn meter_status(&self) -> Option<MeterStatus> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|session| session.meter.as_ref())
            .map(AudioLevelMeter::status)
    }

    /// Asynchronous faults recorded since `join`.
    pub async fn fault_count(&self) -> usize {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|session| session.faults.as_ref())
            .map_or(0, AsyncFaultMonitor::fault_count)
    }

    /// Statistics of the current session.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoSession` before `authenticate`.
    pub async fn stats(&self) -> Result<StatsCollector, ClientError> {
        let handle = self
            .session
            .lock()
            .await
            .as_ref()
            .map(|session| session.handle.clone())
            .ok_or(ClientError::NoSession)?;
        handle.stats().await
    }

    /// Sink for facade callbacks of the current session.
    pub async fn event_sink(&self) -> Option<EventSink> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.handle.event_sink())
    }
}
