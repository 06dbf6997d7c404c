//! Meeting client error types.
//!
//! Only provisioning failures reach the user; everything else degrades the
//! affected feature and is logged with enough context for diagnosis.

use crate::lifecycle::LifecycleState;
use common::error::CommonError;
use thiserror::Error;

/// Meeting client error type.
///
/// Error classes:
/// - `CapacityExceeded`: no free display slot, the tile is dropped
/// - `UnknownSubject`: event for an attendee with no roster entry, ignored
/// - `Provisioning`: join/end request failed, surfaced to the user
/// - `UnsupportedCapability`: a device feature is missing, feature disabled
/// - `AsynchronousFault`: a facade-driven task failed, logged
#[derive(Debug, Error)]
pub enum ClientError {
    /// Every display slot is bound.
    #[error("No display slot available (capacity {max_slots})")]
    CapacityExceeded { max_slots: usize },

    /// Event referenced an attendee with no roster entry.
    #[error("Unknown attendee: {0}")]
    UnknownSubject(String),

    /// Provisioning request failed (network or server error).
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// A capture or device capability is unavailable.
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// A facade-driven async task failed.
    #[error("Asynchronous fault: {0}")]
    AsynchronousFault(String),

    /// The session facade rejected a call.
    #[error("Session facade error: {0}")]
    Facade(String),

    /// Lifecycle operation called from a state that does not allow it.
    #[error("Invalid lifecycle transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Operation requires an authenticated session.
    #[error("No meeting session")]
    NoSession,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (channel closed, actor gone).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether this error is shown to the user rather than only logged.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ClientError::Provisioning(_))
    }

    /// Returns a user-safe message (no internal details).
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Provisioning(_) => {
                "Could not reach the meeting service, please try again".to_string()
            }
            ClientError::CapacityExceeded { .. } => {
                "Too many video feeds to display".to_string()
            }
            ClientError::UnsupportedCapability(_) => {
                "This device does not support the requested feature".to_string()
            }
            ClientError::InvalidTransition { .. } | ClientError::NoSession => {
                "That action is not available right now".to_string()
            }
            ClientError::UnknownSubject(_)
            | ClientError::AsynchronousFault(_)
            | ClientError::Facade(_)
            | ClientError::Config(_)
            | ClientError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<CommonError> for ClientError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Configuration(msg) => ClientError::Config(msg),
            CommonError::InvalidIdentifier(msg) | CommonError::Serialization(msg) => {
                ClientError::Provisioning(msg)
            }
        }
    }
}
