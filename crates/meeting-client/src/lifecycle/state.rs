//! Meeting lifecycle states and the shared state cell.

use crate::errors::ClientError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Where the client is in the meeting lifecycle.
///
/// ```text
/// Idle -> Authenticating <-> Authenticated -> Joining -> Active
///                                  ^                        |
///                                  +----- soft recovery ----+
/// Active/Joining/Authenticated -> Leaving | Ending -> Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Authenticating,
    /// Credentials obtained and the facade initialized; waiting for `join`.
    Authenticated,
    Joining,
    Active,
    Leaving,
    Ending,
    Terminated,
}

impl LifecycleState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::{
            Active, Authenticated, Authenticating, Ending, Idle, Joining, Leaving, Terminated,
        };
        match (self, next) {
            // Concurrent authenticate calls share one flight; an unjoined
            // session can be replaced by one for another title
            (Idle | Terminated | Authenticating | Authenticated, Authenticating) => true,
            (Authenticating, Authenticated | Idle) => true,
            (Authenticated, Joining) => true,
            (Joining, Active | Authenticated) => true,
            // Soft recovery after a non-terminal stop
            (Active, Authenticated) => true,
            (Authenticated | Joining | Active, Leaving | Ending | Terminated) => true,
            // A rejected end request returns to where it started
            (Ending, Authenticated | Joining | Active) => true,
            (Leaving | Ending, Terminated) => true,
            _ => false,
        }
    }

    /// Whether a session exists that `leave`/`end` can tear down.
    #[must_use]
    pub fn is_in_meeting(self) -> bool {
        matches!(
            self,
            LifecycleState::Authenticated | LifecycleState::Joining | LifecycleState::Active
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Authenticating => "authenticating",
            LifecycleState::Authenticated => "authenticated",
            LifecycleState::Joining => "joining",
            LifecycleState::Active => "active",
            LifecycleState::Leaving => "leaving",
            LifecycleState::Ending => "ending",
            LifecycleState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared lifecycle state, written by the controller and the session actor
/// and watched by the rendering shell.
#[derive(Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            state: Arc::new(state),
        }
    }

    #[must_use]
    pub fn current(&self) -> LifecycleState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Move to `next`, returning the previous state.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidTransition` (and changes nothing) if the
    /// transition is not legal from the current state.
    pub fn transition(&self, next: LifecycleState) -> Result<LifecycleState, ClientError> {
        let mut previous = next;
        let mut allowed = false;
        self.state.send_if_modified(|state| {
            previous = *state;
            allowed = state.can_transition_to(next);
            if allowed && *state != next {
                *state = next;
                true
            } else {
                false
            }
        });

        if !allowed {
            debug!(
                target: "client.lifecycle",
                from = %previous,
                to = %next,
                "Rejected lifecycle transition"
            );
            return Err(ClientError::InvalidTransition {
                from: previous,
                to: next,
            });
        }
        if previous != next {
            info!(target: "client.lifecycle", from = %previous, to = %next, "Lifecycle transition");
        }
        Ok(previous)
    }

    /// Move to `next` only if the current state is one of `from`.
    /// Returns whether the state changed.
    pub fn transition_if(&self, from: &[LifecycleState], next: LifecycleState) -> bool {
        let mut previous = next;
        let changed = self.state.send_if_modified(|state| {
            previous = *state;
            if *state != next && from.contains(state) {
                *state = next;
                true
            } else {
                false
            }
        });
        if changed {
            info!(target: "client.lifecycle", from = %previous, to = %next, "Lifecycle transition");
        }
        changed
    }
}
