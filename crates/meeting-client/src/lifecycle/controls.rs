//! Meeting control state for the rendering shell.
//!
//! Pure state: the shell watches [`ControlState`] and renders buttons from
//! it. The leave and end controls double as the re-entrancy gate for
//! teardown: a [`TransitionGuard`] disables both for its lifetime.

use tokio::sync::watch;
use tracing::debug;

/// Toggle buttons shown during a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlButton {
    Microphone,
    Camera,
    Speaker,
    ContentShare,
    PauseContentShare,
    VideoStats,
}

/// Toggle states, initialized for a fresh meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonStates {
    pub microphone: bool,
    pub camera: bool,
    pub speaker: bool,
    pub content_share: bool,
    pub pause_content_share: bool,
    pub video_stats: bool,
}

impl Default for ButtonStates {
    fn default() -> Self {
        Self {
            microphone: true,
            camera: false,
            speaker: true,
            content_share: false,
            pause_content_share: false,
            video_stats: false,
        }
    }
}

impl ButtonStates {
    #[must_use]
    pub fn get(&self, button: ControlButton) -> bool {
        match button {
            ControlButton::Microphone => self.microphone,
            ControlButton::Camera => self.camera,
            ControlButton::Speaker => self.speaker,
            ControlButton::ContentShare => self.content_share,
            ControlButton::PauseContentShare => self.pause_content_share,
            ControlButton::VideoStats => self.video_stats,
        }
    }

    fn slot(&mut self, button: ControlButton) -> &mut bool {
        match button {
            ControlButton::Microphone => &mut self.microphone,
            ControlButton::Camera => &mut self.camera,
            ControlButton::Speaker => &mut self.speaker,
            ControlButton::ContentShare => &mut self.content_share,
            ControlButton::PauseContentShare => &mut self.pause_content_share,
            ControlButton::VideoStats => &mut self.video_stats,
        }
    }
}

/// Everything the shell needs to render meeting controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub buttons: ButtonStates,
    pub leave_enabled: bool,
    pub end_enabled: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            buttons: ButtonStates::default(),
            leave_enabled: true,
            end_enabled: true,
        }
    }
}

/// Result of a leave or end request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Completed,
    /// Another leave/end is running; nothing was done.
    InProgress,
    /// No session to tear down; nothing was done.
    NotInMeeting,
    /// The user declined the end confirmation.
    Cancelled,
}

/// Observable control state.
pub struct ControlPanel {
    state: watch::Sender<ControlState>,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPanel {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(ControlState::default());
        Self { state }
    }

    #[must_use]
    pub fn current(&self) -> ControlState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.state.subscribe()
    }

    /// Flip a toggle and return its new state.
    pub fn toggle(&self, button: ControlButton) -> bool {
        let mut now = false;
        self.state.send_modify(|state| {
            let slot = state.buttons.slot(button);
            *slot = !*slot;
            now = *slot;
        });
        now
    }

    /// Put every toggle back to its initial state.
    pub fn reset_buttons(&self) {
        self.state.send_modify(|state| state.buttons = ButtonStates::default());
    }

    /// Disable leave and end for the duration of a teardown.
    ///
    /// Returns `None` if a teardown already holds the controls.
    #[must_use]
    pub fn begin_transition(&self) -> Option<TransitionGuard<'_>> {
        let acquired = self.state.send_if_modified(|state| {
            if state.leave_enabled && state.end_enabled {
                state.leave_enabled = false;
                state.end_enabled = false;
                true
            } else {
                false
            }
        });
        if acquired {
            Some(TransitionGuard { panel: self })
        } else {
            debug!(target: "client.lifecycle", "Leave/end already in progress");
            None
        }
    }
}

/// Holds the leave and end controls disabled; re-enables them on drop.
pub struct TransitionGuard<'a> {
    panel: &'a ControlPanel,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.panel.state.send_modify(|state| {
            state.leave_enabled = true;
            state.end_enabled = true;
        });
    }
}
