//! Provisioning service error types.
//!
//! Every error renders as a JSON `{"error": "..."}` body, which the meeting
//! client treats as a failed request regardless of status code. Backend
//! failures are logged server-side and reported to the caller generically.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::provisioning::ErrorResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Need parameters: title, name, region")]
    MissingJoinParameters,

    #[error("Need parameters: title")]
    MissingTitle,

    #[error("Meeting not found: {0}")]
    UnknownMeeting(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl ProvisioningError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProvisioningError::MissingJoinParameters | ProvisioningError::MissingTitle => {
                StatusCode::BAD_REQUEST
            }
            ProvisioningError::UnknownMeeting(_) => StatusCode::NOT_FOUND,
            ProvisioningError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProvisioningError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ProvisioningError::Backend(err) => {
                tracing::error!(target: "provisioning.backend", error = %err, "Backend request failed");
                "Meeting backend request failed".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
