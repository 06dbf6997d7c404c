//! `SessionActor` - single execution context for one meeting session.
//!
//! The actor owns the roster, the slot table, the diagnostic filter and the
//! statistics collector. Facade callbacks and controller commands are handled
//! one at a time, so no two handlers ever run concurrently and no state is
//! shared behind a lock. Results are published through [`SessionViews`].

use super::messages::{SessionMessage, SessionNotification};
use super::stats::{BandwidthReport, StatsCollector};
use crate::devices::{DeviceLists, MediaDevice};
use crate::diagnostics::{DiagnosticEventFilter, DiagnosticSink};
use crate::errors::ClientError;
use crate::facade::{
    ActiveSpeakerPolicy, AudioVideoFacade, EventSink, FacadeEvent, SessionStatusCode,
    StopDisposition, TileState,
};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::observability::metrics;
use crate::roster::{self, PresenceChange, RosterSnapshot, RosterStore};
use crate::tiles::{SlotSnapshot, TileOrganizer, RELEASE_SENTINEL};
use chrono::Utc;
use common::types::{AttendeeId, MeetingId, TileId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Controller command mailbox size.
const SESSION_CHANNEL_BUFFER: usize = 64;

/// Facade callback mailbox size. Volume callbacks arrive several times a
/// second per attendee.
const FACADE_EVENT_BUFFER: usize = 1024;

/// Notification backlog per subscriber.
const NOTIFICATION_BUFFER: usize = 64;

/// Observable session state for the rendering shell.
///
/// Outlives individual sessions so the shell subscribes once.
pub struct SessionViews {
    roster: watch::Sender<RosterSnapshot>,
    slots: watch::Sender<SlotSnapshot>,
    bandwidth: watch::Sender<BandwidthReport>,
    devices: watch::Sender<DeviceLists>,
    notifications: broadcast::Sender<SessionNotification>,
}

impl Default for SessionViews {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionViews {
    #[must_use]
    pub fn new() -> Self {
        let (roster, _) = watch::channel(RosterSnapshot::default());
        let (slots, _) = watch::channel(SlotSnapshot::default());
        let (bandwidth, _) = watch::channel(BandwidthReport::default());
        let (devices, _) = watch::channel(DeviceLists::default());
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self {
            roster,
            slots,
            bandwidth,
            devices,
            notifications,
        }
    }

    #[must_use]
    pub fn roster(&self) -> watch::Receiver<RosterSnapshot> {
        self.roster.subscribe()
    }

    #[must_use]
    pub fn slots(&self) -> watch::Receiver<SlotSnapshot> {
        self.slots.subscribe()
    }

    #[must_use]
    pub fn bandwidth(&self) -> watch::Receiver<BandwidthReport> {
        self.bandwidth.subscribe()
    }

    #[must_use]
    pub fn devices(&self) -> watch::Receiver<DeviceLists> {
        self.devices.subscribe()
    }

    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<SessionNotification> {
        self.notifications.subscribe()
    }

    fn notify(&self, notification: SessionNotification) {
        // No subscribers is fine
        if self.notifications.send(notification).is_err() {
            trace!(target: "client.session", "Notification without subscribers");
        }
    }
}

/// Per-session subscription settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub meeting_id: MeetingId,
    pub local_attendee_id: AttendeeId,
    pub speaker_policy: ActiveSpeakerPolicy,
    /// Zero disables speaker scores.
    pub score_interval: Duration,
    /// Parent of the meter and fault monitor tokens; cancelled when the
    /// facade reports a full reset.
    pub media_scope: CancellationToken,
}

/// Handle to a `SessionActor`.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    event_sink: EventSink,
    cancel_token: CancellationToken,
    meeting_id: MeetingId,
}

impl SessionHandle {
    #[must_use]
    pub fn meeting_id(&self) -> &MeetingId {
        &self.meeting_id
    }

    /// Sink that delivers facade callbacks to this session.
    #[must_use]
    pub fn event_sink(&self) -> EventSink {
        self.event_sink.clone()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| ClientError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| ClientError::Internal(format!("response receive failed: {e}")))
    }

    /// Drop accumulated statistics.
    pub async fn reset_stats(&self) -> Result<(), ClientError> {
        self.request(|respond_to| SessionMessage::ResetStats { respond_to })
            .await
    }

    /// Empty the roster and the slot table.
    pub async fn clear_roster(&self) -> Result<(), ClientError> {
        self.request(|respond_to| SessionMessage::ClearRoster { respond_to })
            .await
    }

    /// Snapshot of the statistics collector.
    pub async fn stats(&self) -> Result<StatsCollector, ClientError> {
        self.request(|respond_to| SessionMessage::GetStats { respond_to })
            .await
    }

    /// Replace the device picker contents.
    pub async fn set_devices(
        &self,
        inputs: Vec<MediaDevice>,
        outputs: Vec<MediaDevice>,
    ) -> Result<(), ClientError> {
        self.sender
            .send(SessionMessage::SetDevices { inputs, outputs })
            .await
            .map_err(|e| ClientError::Internal(format!("channel send failed: {e}")))
    }

    /// Stop the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The session actor.
pub struct SessionActor {
    meeting_id: MeetingId,
    local_attendee_id: AttendeeId,
    facade: Arc<dyn AudioVideoFacade>,
    receiver: mpsc::Receiver<SessionMessage>,
    events: mpsc::Receiver<FacadeEvent>,
    /// Handed to per-attendee volume subscriptions.
    sink: EventSink,
    cancel_token: CancellationToken,
    media_scope: CancellationToken,
    views: Arc<SessionViews>,
    lifecycle: Lifecycle,
    roster: RosterStore,
    tiles: TileOrganizer,
    filter: DiagnosticEventFilter,
    stats: StatsCollector,
    inputs: Vec<MediaDevice>,
    outputs: Vec<MediaDevice>,
}

impl SessionActor {
    /// Spawn the actor and subscribe it to the facade's callbacks.
    pub fn spawn(
        facade: Arc<dyn AudioVideoFacade>,
        views: Arc<SessionViews>,
        lifecycle: Lifecycle,
        diagnostics: Arc<dyn DiagnosticSink>,
        settings: SessionSettings,
        cancel_token: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);
        let (event_tx, events) = mpsc::channel(FACADE_EVENT_BUFFER);
        let sink = EventSink::new(event_tx);

        facade.subscribe_to_attendee_presence(sink.clone());
        facade.subscribe_to_active_speaker_detector(
            settings.speaker_policy,
            sink.clone(),
            settings.score_interval,
        );
        facade.subscribe_to_mute_state(sink.clone());
        facade.add_observer(sink.clone());

        let actor = Self {
            meeting_id: settings.meeting_id.clone(),
            local_attendee_id: settings.local_attendee_id,
            facade,
            receiver,
            events,
            sink: sink.clone(),
            cancel_token: cancel_token.clone(),
            media_scope: settings.media_scope,
            views,
            lifecycle,
            roster: RosterStore::new(),
            tiles: TileOrganizer::new(),
            filter: DiagnosticEventFilter::new(diagnostics),
            stats: StatsCollector::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        actor.publish_roster();
        actor.publish_slots();
        actor.views.bandwidth.send_replace(BandwidthReport::default());

        let task = tokio::spawn(actor.run());

        let handle = SessionHandle {
            sender,
            event_sink: sink,
            cancel_token,
            meeting_id: settings.meeting_id,
        };
        (handle, task)
    }

    #[instrument(skip_all, name = "session", fields(meeting_id = %self.meeting_id))]
    async fn run(mut self) {
        info!(
            target: "client.session",
            attendee_id = %self.local_attendee_id,
            "SessionActor started"
        );

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => break,
                message = self.receiver.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event),
            }
        }

        info!(target: "client.session", "SessionActor stopped");
    }

    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::ResetStats { respond_to } => {
                self.stats.reset();
                debug!(target: "client.session", "Statistics reset");
                let _ = respond_to.send(());
            }
            SessionMessage::ClearRoster { respond_to } => {
                self.clear_roster();
                let _ = respond_to.send(());
            }
            SessionMessage::SetDevices { inputs, outputs } => {
                self.inputs = inputs;
                self.outputs = outputs;
                self.publish_devices();
            }
            SessionMessage::GetStats { respond_to } => {
                let _ = respond_to.send(self.stats.clone());
            }
        }
    }

    fn handle_event(&mut self, event: FacadeEvent) {
        match event {
            FacadeEvent::AttendeePresence {
                attendee_id,
                present,
                external_user_id,
                dropped,
            } => self.on_presence(&attendee_id, present, &external_user_id, dropped),
            FacadeEvent::VolumeIndicator {
                attendee_id,
                volume,
                muted,
                signal_strength,
            } => {
                if self
                    .roster
                    .on_volume_update(&attendee_id, volume, muted, signal_strength)
                {
                    self.publish_roster();
                }
            }
            FacadeEvent::ActiveSpeakers(ranked) => {
                roster::apply_ranking(&mut self.roster, &ranked);
                self.publish_roster();
            }
            FacadeEvent::ActiveSpeakerScores(scores) => {
                if roster::apply_scores(&mut self.roster, &scores) > 0 {
                    self.publish_roster();
                }
            }
            FacadeEvent::LocalMuteChanged(muted) => {
                info!(target: "client.session", muted, "Local mute changed");
                self.views
                    .notify(SessionNotification::LocalMuteChanged { muted });
            }
            FacadeEvent::CanUnmuteChanged(can_unmute) => {
                info!(target: "client.session", can_unmute, "Can unmute changed");
                self.views
                    .notify(SessionNotification::CanUnmuteChanged { can_unmute });
            }
            FacadeEvent::VideoTileUpdated(tile) => self.on_tile_updated(&tile),
            FacadeEvent::VideoTileRemoved(tile_id) => self.on_tile_removed(tile_id),
            FacadeEvent::Metrics(report) => {
                let bandwidth = self.stats.record(&report);
                self.views.bandwidth.send_replace(bandwidth);
            }
            FacadeEvent::SessionEvent(event) => {
                self.filter.on_event(event, Utc::now());
            }
            FacadeEvent::StartConnecting { reconnecting } => {
                info!(target: "client.session", reconnecting, "Session connecting");
                self.views
                    .notify(SessionNotification::StartConnecting { reconnecting });
            }
            FacadeEvent::Started => {
                info!(target: "client.session", "Session started");
                self.views.notify(SessionNotification::Started);
            }
            FacadeEvent::Stopped(code) => self.on_stopped(code),
            FacadeEvent::ConnectionPoor => {
                warn!(target: "client.session", "Connection is poor");
                self.views.notify(SessionNotification::ConnectionPoor);
            }
            FacadeEvent::ConnectionGood => {
                info!(target: "client.session", "Connection is good now");
                self.views.notify(SessionNotification::ConnectionGood);
            }
            FacadeEvent::ConnectionSuggestStopVideo => {
                warn!(target: "client.session", "Suggest turning the video off");
                self.views.notify(SessionNotification::SuggestStopVideo);
            }
            FacadeEvent::DownlinkBandwidthInsufficient {
                estimated_kbps,
                required_kbps,
            } => {
                warn!(
                    target: "client.session",
                    estimated_kbps,
                    required_kbps,
                    "Estimated downlink bandwidth below what video requires"
                );
                self.views
                    .notify(SessionNotification::DownlinkBandwidthInsufficient {
                        estimated_kbps,
                        required_kbps,
                    });
            }
            FacadeEvent::AudioInputStreamEnded { device_id } => {
                warn!(target: "client.session", device_id = %device_id, "Audio input stream ended");
                self.views
                    .notify(SessionNotification::AudioInputStreamEnded { device_id });
            }
            FacadeEvent::AudioInputsChanged(inputs) => {
                debug!(target: "client.session", count = inputs.len(), "Audio inputs changed");
                self.inputs = inputs;
                self.publish_devices();
            }
            FacadeEvent::AudioOutputsChanged(outputs) => {
                debug!(target: "client.session", count = outputs.len(), "Audio outputs changed");
                self.outputs = outputs;
                self.publish_devices();
            }
        }
    }

    fn on_presence(
        &mut self,
        attendee_id: &AttendeeId,
        present: bool,
        external_user_id: &str,
        dropped: bool,
    ) {
        match self
            .roster
            .on_presence(attendee_id, present, external_user_id, dropped)
        {
            PresenceChange::Added => {
                self.facade
                    .subscribe_to_volume_indicator(attendee_id, self.sink.clone());
                self.publish_roster();
            }
            PresenceChange::Removed => {
                self.facade.unsubscribe_from_volume_indicator(attendee_id);
                self.publish_roster();
            }
            PresenceChange::AlreadyPresent | PresenceChange::AlreadyAbsent => {}
        }
    }

    fn on_tile_updated(&mut self, tile: &TileState) {
        if tile.local_tile {
            return;
        }
        let Some(attendee_id) = tile.bound_attendee_id.as_ref() else {
            trace!(target: "client.tiles", tile_id = %tile.tile_id, "Tile not bound to an attendee yet");
            return;
        };

        match self.tiles.acquire(tile.tile_id) {
            Ok(slot) => {
                debug!(
                    target: "client.tiles",
                    tile_id = %tile.tile_id,
                    attendee_id = %attendee_id,
                    slot,
                    is_content = tile.is_content,
                    "Remote tile shown"
                );
                self.publish_slots();
            }
            Err(e) => {
                if matches!(e, ClientError::CapacityExceeded { .. }) {
                    metrics::record_tile_capacity_exceeded();
                }
                self.views.notify(SessionNotification::TileDropped {
                    tile_id: tile.tile_id,
                });
            }
        }
    }

    fn on_tile_removed(&mut self, tile_id: TileId) {
        if self.tiles.release(tile_id) != RELEASE_SENTINEL {
            self.publish_slots();
        }
    }

    fn on_stopped(&mut self, code: SessionStatusCode) {
        self.stats.reset();
        let disposition = code.classify();
        metrics::record_session_stop(code.as_str(), disposition.as_str());

        match disposition {
            StopDisposition::FullReset => {
                info!(target: "client.session", reason = code.as_str(), "Session stopped, returning to start");
                self.lifecycle.transition_if(
                    &[
                        LifecycleState::Authenticated,
                        LifecycleState::Joining,
                        LifecycleState::Active,
                        LifecycleState::Leaving,
                        LifecycleState::Ending,
                    ],
                    LifecycleState::Terminated,
                );
                self.media_scope.cancel();
                self.clear_roster();
            }
            StopDisposition::SoftRecovery => {
                warn!(target: "client.session", reason = code.as_str(), "Session stopped");
                let finished = self.lifecycle.transition_if(
                    &[LifecycleState::Leaving, LifecycleState::Ending],
                    LifecycleState::Terminated,
                );
                if !finished {
                    self.lifecycle.transition_if(
                        &[LifecycleState::Joining, LifecycleState::Active],
                        LifecycleState::Authenticated,
                    );
                }
            }
        }

        self.views
            .notify(SessionNotification::Stopped { code, disposition });
    }

    fn clear_roster(&mut self) {
        for (attendee_id, _) in self.roster.iter() {
            self.facade.unsubscribe_from_volume_indicator(attendee_id);
        }
        self.roster.clear();
        self.tiles.clear();
        self.publish_roster();
        self.publish_slots();
        debug!(target: "client.session", "Roster cleared");
    }

    fn publish_roster(&self) {
        self.views.roster.send_replace(self.roster.snapshot());
    }

    fn publish_slots(&self) {
        metrics::set_tiles_bound(self.tiles.bound_count());
        self.views.slots.send_replace(self.tiles.snapshot());
    }

    fn publish_devices(&self) {
        self.views
            .devices
            .send_replace(DeviceLists::build(&self.inputs, &self.outputs));
    }
}
