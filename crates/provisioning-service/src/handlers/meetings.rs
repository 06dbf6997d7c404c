//! Join and end handlers.
//!
//! A title maps to one meeting for as long as this process remembers it;
//! every join creates a new attendee in that meeting.

use crate::backend::CreateMeetingRequest;
use crate::errors::ProvisioningError;
use crate::observability::metrics;
use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::Json;
use common::provisioning::{
    truncate_external_id, AttendeeEnvelope, JoinInfo, JoinResponse, MeetingEnvelope,
    StatusResponse, EXTERNAL_USER_ID_SEPARATOR,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, Span};
use uuid::Uuid;

/// Message returned by a successful `POST /end`.
pub const MEETING_ENDED_MESSAGE: &str = "Meeting ended permanently";

/// Length of the random prefix of an external user id.
const USER_PREFIX_LEN: usize = 8;

/// Query string of `POST /join`. Empty values count as missing.
#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    pub title: Option<String>,
    pub name: Option<String>,
    pub region: Option<String>,
}

impl JoinParams {
    fn required(&self) -> Option<(&str, &str, &str)> {
        Some((
            non_empty(&self.title)?,
            non_empty(&self.name)?,
            non_empty(&self.region)?,
        ))
    }
}

/// Query string of `POST /end`.
#[derive(Debug, Default, Deserialize)]
pub struct EndParams {
    pub title: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// `<8 random hex>#<name>`, truncated. The prefix keeps two attendees with
/// the same display name distinct.
pub fn external_user_id(name: &str) -> String {
    let prefix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(USER_PREFIX_LEN)
        .collect();
    truncate_external_id(&format!("{prefix}{EXTERNAL_USER_ID_SEPARATOR}{name}"))
}

/// `POST /join?title&name&region`.
///
/// Creates the meeting for `title` unless this process already holds one,
/// then adds an attendee for `name`.
#[tracing::instrument(skip_all, name = "provisioning.join", fields(title, meeting_id))]
pub async fn join_meeting(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JoinParams>,
) -> Result<Json<JoinResponse>, ProvisioningError> {
    let (title, name, region) = params
        .required()
        .ok_or(ProvisioningError::MissingJoinParameters)?;
    Span::current().record("title", title);

    let backend = Arc::clone(&state.backend);
    let meeting = state
        .registry
        .get_or_create(title, || async move {
            let meeting = backend
                .create_meeting(CreateMeetingRequest {
                    client_request_token: Uuid::new_v4(),
                    media_region: region.to_string(),
                    external_meeting_id: truncate_external_id(title),
                })
                .await?;
            metrics::record_meeting_created();
            Ok::<_, ProvisioningError>(meeting)
        })
        .await?;
    Span::current().record("meeting_id", meeting.meeting_id.as_str());

    let attendee = state
        .backend
        .create_attendee(&meeting.meeting_id, external_user_id(name))
        .await?;
    metrics::record_attendee_created();

    info!(
        target: "provisioning.handlers",
        meeting_id = %meeting.meeting_id,
        attendee_id = %attendee.attendee_id,
        "Attendee joined"
    );

    Ok(Json(JoinResponse {
        join_info: JoinInfo {
            meeting: MeetingEnvelope { meeting },
            attendee: AttendeeEnvelope { attendee },
        },
    }))
}

/// `POST /end?title`: delete the meeting and forget the title.
#[tracing::instrument(skip_all, name = "provisioning.end", fields(title))]
pub async fn end_meeting(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EndParams>,
) -> Result<Json<StatusResponse>, ProvisioningError> {
    let title = non_empty(&params.title).ok_or(ProvisioningError::MissingTitle)?;
    Span::current().record("title", title);

    let meeting = state
        .registry
        .lookup(title)
        .await
        .ok_or_else(|| ProvisioningError::UnknownMeeting(title.to_string()))?;

    state.backend.delete_meeting(&meeting.meeting_id).await?;
    state.registry.forget(title).await;
    metrics::record_meeting_ended();

    info!(target: "provisioning.handlers", meeting_id = %meeting.meeting_id, "Meeting ended");

    Ok(Json(StatusResponse {
        status: true,
        message: MEETING_ENDED_MESSAGE.to_string(),
    }))
}
