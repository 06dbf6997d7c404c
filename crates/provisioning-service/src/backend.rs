//! Media backend seam.
//!
//! The service only needs three calls from the backend that actually hosts
//! meetings. [`InMemoryBackend`] implements them locally for development and
//! tests.

use crate::errors::ProvisioningError;
use async_trait::async_trait;
use common::error::CommonError;
use common::provisioning::{AttendeeInfo, MediaPlacement, MeetingInfo};
use common::secret::SecretString;
use common::types::{AttendeeId, MeetingId};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Parameters for creating a meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMeetingRequest {
    /// Idempotency token. A retried request with the same token returns the
    /// meeting the first one created.
    pub client_request_token: Uuid,
    /// Region hosting the meeting's media.
    pub media_region: String,
    /// Caller-chosen identifier, already truncated.
    pub external_meeting_id: String,
}

#[async_trait]
pub trait MeetingBackend: Send + Sync {
    async fn create_meeting(
        &self,
        request: CreateMeetingRequest,
    ) -> Result<MeetingInfo, ProvisioningError>;

    async fn create_attendee(
        &self,
        meeting_id: &MeetingId,
        external_user_id: String,
    ) -> Result<AttendeeInfo, ProvisioningError>;

    async fn delete_meeting(&self, meeting_id: &MeetingId) -> Result<(), ProvisioningError>;
}

#[derive(Default)]
struct InMemoryState {
    by_token: HashMap<Uuid, MeetingId>,
    meetings: HashMap<MeetingId, HostedMeeting>,
    meetings_created: usize,
    attendees_created: usize,
}

struct HostedMeeting {
    info: MeetingInfo,
    attendees: Vec<AttendeeId>,
}

/// Backend that keeps meetings in process memory.
pub struct InMemoryBackend {
    control_region: String,
    state: Mutex<InMemoryState>,
}

impl InMemoryBackend {
    pub fn new(control_region: impl Into<String>) -> Self {
        Self {
            control_region: control_region.into(),
            state: Mutex::new(InMemoryState::default()),
        }
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut InMemoryState) -> Result<T, ProvisioningError>,
    ) -> Result<T, ProvisioningError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProvisioningError::Backend("backend state poisoned".to_string()))?;
        f(&mut state)
    }

    /// Meetings created since startup (retries with a known token excluded).
    pub fn meetings_created(&self) -> usize {
        self.with_state(|s| Ok(s.meetings_created)).unwrap_or_default()
    }

    pub fn attendees_created(&self) -> usize {
        self.with_state(|s| Ok(s.attendees_created)).unwrap_or_default()
    }

    /// Attendees currently in `meeting_id`.
    pub fn attendee_count(&self, meeting_id: &MeetingId) -> usize {
        self.with_state(|s| {
            Ok(s.meetings
                .get(meeting_id)
                .map_or(0, |meeting| meeting.attendees.len()))
        })
        .unwrap_or_default()
    }

    fn placement(&self, media_region: &str) -> MediaPlacement {
        let host = format!("{media_region}.media.local");
        MediaPlacement {
            audio_host_url: format!("{host}:3478"),
            signaling_url: format!("wss://signal.{host}/control"),
            turn_control_url: format!(
                "https://turn.{}.control.local/v2/turn_sessions",
                self.control_region
            ),
        }
    }
}

fn new_id<T>(make: impl FnOnce(String) -> Result<T, CommonError>) -> Result<T, ProvisioningError> {
    make(Uuid::new_v4().to_string()).map_err(|e| ProvisioningError::Backend(e.to_string()))
}

#[async_trait]
impl MeetingBackend for InMemoryBackend {
    async fn create_meeting(
        &self,
        request: CreateMeetingRequest,
    ) -> Result<MeetingInfo, ProvisioningError> {
        let placement = self.placement(&request.media_region);
        self.with_state(|state| {
            if let Some(existing) = state
                .by_token
                .get(&request.client_request_token)
                .and_then(|id| state.meetings.get(id))
            {
                debug!(target: "provisioning.backend", meeting_id = %existing.info.meeting_id, "Replayed create request");
                return Ok(existing.info.clone());
            }

            let meeting_id = new_id(MeetingId::new)?;
            let info = MeetingInfo {
                meeting_id: meeting_id.clone(),
                external_meeting_id: Some(request.external_meeting_id),
                media_region: request.media_region,
                media_placement: placement,
            };
            state
                .by_token
                .insert(request.client_request_token, meeting_id.clone());
            state.meetings.insert(
                meeting_id.clone(),
                HostedMeeting {
                    info: info.clone(),
                    attendees: Vec::new(),
                },
            );
            state.meetings_created += 1;
            info!(target: "provisioning.backend", meeting_id = %meeting_id, media_region = %info.media_region, "Meeting created");
            Ok(info)
        })
    }

    async fn create_attendee(
        &self,
        meeting_id: &MeetingId,
        external_user_id: String,
    ) -> Result<AttendeeInfo, ProvisioningError> {
        self.with_state(|state| {
            let meeting = state.meetings.get_mut(meeting_id).ok_or_else(|| {
                ProvisioningError::Backend(format!("meeting {meeting_id} does not exist"))
            })?;
            let attendee_id = new_id(AttendeeId::new)?;
            meeting.attendees.push(attendee_id.clone());
            state.attendees_created += 1;

            let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
            Ok(AttendeeInfo {
                attendee_id,
                external_user_id,
                join_token: SecretString::from(token),
            })
        })
    }

    async fn delete_meeting(&self, meeting_id: &MeetingId) -> Result<(), ProvisioningError> {
        self.with_state(|state| {
            state.meetings.remove(meeting_id).ok_or_else(|| {
                ProvisioningError::Backend(format!("meeting {meeting_id} does not exist"))
            })?;
            state.by_token.retain(|_, id| id != meeting_id);
            info!(target: "provisioning.backend", meeting_id = %meeting_id, "Meeting deleted");
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn request(token: Uuid) -> CreateMeetingRequest {
        CreateMeetingRequest {
            client_request_token: token,
            media_region: "eu-west-1".to_string(),
            external_meeting_id: "standup".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_meeting_places_media_in_requested_region() {
        let backend = InMemoryBackend::new("us-east-1");
        let meeting = backend.create_meeting(request(Uuid::new_v4())).await.unwrap();

        assert_eq!(meeting.media_region, "eu-west-1");
        assert_eq!(meeting.external_meeting_id.as_deref(), Some("standup"));
        assert!(meeting.media_placement.audio_host_url.starts_with("eu-west-1."));
        assert!(meeting.media_placement.turn_control_url.contains("us-east-1"));
    }

    #[tokio::test]
    async fn test_replayed_token_returns_same_meeting() {
        let backend = InMemoryBackend::new("us-east-1");
        let token = Uuid::new_v4();

        let first = backend.create_meeting(request(token)).await.unwrap();
        let second = backend.create_meeting(request(token)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.meetings_created(), 1);
    }

    #[tokio::test]
    async fn test_attendees_get_distinct_ids_and_tokens() {
        let backend = InMemoryBackend::new("us-east-1");
        let meeting = backend.create_meeting(request(Uuid::new_v4())).await.unwrap();

        let a = backend
            .create_attendee(&meeting.meeting_id, "0a1b2c3d#Alice".into())
            .await
            .unwrap();
        let b = backend
            .create_attendee(&meeting.meeting_id, "4e5f6a7b#Bob".into())
            .await
            .unwrap();

        assert_ne!(a.attendee_id, b.attendee_id);
        assert_ne!(a.join_token.expose_secret(), b.join_token.expose_secret());
        assert_eq!(backend.attendee_count(&meeting.meeting_id), 2);
    }

    #[tokio::test]
    async fn test_attendee_for_deleted_meeting_fails() {
        let backend = InMemoryBackend::new("us-east-1");
        let meeting = backend.create_meeting(request(Uuid::new_v4())).await.unwrap();
        backend.delete_meeting(&meeting.meeting_id).await.unwrap();

        let result = backend
            .create_attendee(&meeting.meeting_id, "0a1b2c3d#Alice".into())
            .await;
        assert!(matches!(result, Err(ProvisioningError::Backend(_))));

        let again = backend.delete_meeting(&meeting.meeting_id).await;
        assert!(matches!(again, Err(ProvisioningError::Backend(_))));
    }
}
