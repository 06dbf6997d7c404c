//! Pre-configured test data for meeting client tests.
//!
//! Provides builders for:
//! - Join responses (meeting + attendee records)
//! - Attendee and meeting identifiers
//! - Client configuration pointing at a test base URL

use common::provisioning::{
    AttendeeEnvelope, AttendeeInfo, JoinInfo, MediaPlacement, MeetingEnvelope, MeetingInfo,
};
use common::secret::SecretString;
use common::types::{AttendeeId, MeetingId};
use meeting_client::ClientConfig;
use std::collections::HashMap;
use uuid::Uuid;

/// Attendee id from a literal.
#[must_use]
pub fn attendee(id: &str) -> AttendeeId {
    AttendeeId::new(id).expect("valid attendee id")
}

/// Meeting id from a literal.
#[must_use]
pub fn meeting(id: &str) -> MeetingId {
    MeetingId::new(id).expect("valid meeting id")
}

/// Client configuration with defaults and the given extra variables.
#[must_use]
pub fn test_config_with(extra: &[(&str, &str)]) -> ClientConfig {
    let mut vars: HashMap<String, String> = HashMap::from([(
        "MEETING_BASE_URL".to_string(),
        "http://localhost:8081/".to_string(),
    )]);
    for (key, value) in extra {
        vars.insert((*key).to_string(), (*value).to_string());
    }
    ClientConfig::from_vars(&vars).expect("valid test configuration")
}

/// Client configuration with defaults.
#[must_use]
pub fn test_config() -> ClientConfig {
    test_config_with(&[])
}

/// Builder for `JoinInfo` fixtures.
#[derive(Debug, Clone)]
pub struct JoinInfoBuilder {
    meeting_id: String,
    external_meeting_id: Option<String>,
    media_region: String,
    attendee_id: String,
    external_user_id: String,
    join_token: String,
}

impl Default for JoinInfoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinInfoBuilder {
    /// Random meeting and attendee ids in `us-east-1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meeting_id: Uuid::new_v4().to_string(),
            external_meeting_id: None,
            media_region: "us-east-1".to_string(),
            attendee_id: Uuid::new_v4().to_string(),
            external_user_id: "0a1b2c3d#Test User".to_string(),
            join_token: format!("join-token-{}", Uuid::new_v4()),
        }
    }

    #[must_use]
    pub fn meeting_id(mut self, id: impl Into<String>) -> Self {
        self.meeting_id = id.into();
        self
    }

    #[must_use]
    pub fn external_meeting_id(mut self, title: impl Into<String>) -> Self {
        self.external_meeting_id = Some(title.into());
        self
    }

    #[must_use]
    pub fn media_region(mut self, region: impl Into<String>) -> Self {
        self.media_region = region.into();
        self
    }

    #[must_use]
    pub fn attendee_id(mut self, id: impl Into<String>) -> Self {
        self.attendee_id = id.into();
        self
    }

    #[must_use]
    pub fn external_user_id(mut self, id: impl Into<String>) -> Self {
        self.external_user_id = id.into();
        self
    }

    #[must_use]
    pub fn join_token(mut self, token: impl Into<String>) -> Self {
        self.join_token = token.into();
        self
    }

    #[must_use]
    pub fn build(self) -> JoinInfo {
        let host = format!("{}.media.test", self.media_region);
        JoinInfo {
            meeting: MeetingEnvelope {
                meeting: MeetingInfo {
                    meeting_id: meeting(&self.meeting_id),
                    external_meeting_id: self.external_meeting_id,
                    media_region: self.media_region,
                    media_placement: MediaPlacement {
                        audio_host_url: format!("{host}:3478"),
                        signaling_url: format!("wss://signal.{host}/control"),
                        turn_control_url: format!("https://turn.{host}/v2/turn_sessions"),
                    },
                },
            },
            attendee: AttendeeEnvelope {
                attendee: AttendeeInfo {
                    attendee_id: attendee(&self.attendee_id),
                    external_user_id: self.external_user_id,
                    join_token: SecretString::from(self.join_token),
                },
            },
        }
    }

    /// The `{"JoinInfo": ...}` body the provisioning service returns.
    #[must_use]
    pub fn build_response_json(self) -> serde_json::Value {
        let info = self.build();
        serde_json::json!({ "JoinInfo": info })
    }
}
