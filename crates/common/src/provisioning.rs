//! Wire format shared by the provisioning service and its HTTP client.
//!
//! Field names follow the media backend's PascalCase convention so the JSON
//! matches what existing meeting front ends already parse:
//!
//! ```json
//! {
//!   "JoinInfo": {
//!     "Meeting": { "Meeting": { "MeetingId": "...", "MediaRegion": "us-east-1", ... } },
//!     "Attendee": { "Attendee": { "AttendeeId": "...", "ExternalUserId": "...", "JoinToken": "..." } }
//!   }
//! }
//! ```

use crate::secret::SecretString;
use crate::types::{AttendeeId, MeetingId};
use serde::{Deserialize, Serialize};

/// Maximum length of external meeting and user identifiers.
pub const MAX_EXTERNAL_ID_LEN: usize = 64;

/// Separator between the random prefix and the display name in an external
/// user id (`<8 hex>#<name>`).
pub const EXTERNAL_USER_ID_SEPARATOR: char = '#';

/// Truncate an external identifier to [`MAX_EXTERNAL_ID_LEN`] characters.
#[must_use]
pub fn truncate_external_id(raw: &str) -> String {
    raw.chars().take(MAX_EXTERNAL_ID_LEN).collect()
}

/// Response body of `POST /join`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    #[serde(rename = "JoinInfo")]
    pub join_info: JoinInfo,
}

/// Meeting and attendee records needed to start a media session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JoinInfo {
    pub meeting: MeetingEnvelope,
    pub attendee: AttendeeEnvelope,
}

impl JoinInfo {
    #[must_use]
    pub fn meeting_id(&self) -> &MeetingId {
        &self.meeting.meeting.meeting_id
    }

    #[must_use]
    pub fn attendee_id(&self) -> &AttendeeId {
        &self.attendee.attendee.attendee_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeetingEnvelope {
    pub meeting: MeetingInfo,
}

/// A created meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeetingInfo {
    pub meeting_id: MeetingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_meeting_id: Option<String>,
    pub media_region: String,
    pub media_placement: MediaPlacement,
}

/// Media endpoints the session facade connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaPlacement {
    pub audio_host_url: String,
    pub signaling_url: String,
    pub turn_control_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttendeeEnvelope {
    pub attendee: AttendeeInfo,
}

/// A created attendee and the credential it joins with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttendeeInfo {
    pub attendee_id: AttendeeId,
    pub external_user_id: String,
    #[serde(serialize_with = "crate::secret::serialize_exposed")]
    pub join_token: SecretString,
}

/// `{ "status": true, "message": "..." }` body returned by status and end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: bool,
    pub message: String,
}

/// Error body. Clients treat any response carrying `error` as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
