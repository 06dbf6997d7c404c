//! Client side of the meeting provisioning service.
//!
//! The service creates a meeting at most once per title and a fresh attendee
//! per join. [`JoinFlights`] adds the client half of that guarantee: however
//! many `authenticate` calls race for one title, one join request is sent.

pub mod flights;
pub mod http;
pub mod region;

pub use flights::JoinFlights;
pub use http::HttpProvisioningClient;
pub use region::MediaRegions;

use crate::errors::ClientError;
use common::provisioning::JoinInfo;

/// Parameters of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Meeting title; the service dedups meeting creation on it.
    pub title: String,
    /// Display name of the joining participant.
    pub name: String,
    pub region: String,
}

/// Provisioning operations (enables mocking).
#[async_trait::async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Create (or reuse) the meeting and a new attendee.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Provisioning` on network failure or when the
    /// response carries an `error` field.
    async fn join(&self, request: &JoinRequest) -> Result<JoinInfo, ClientError>;

    /// End the meeting for everyone.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Provisioning` on network or server failure.
    async fn end(&self, title: &str) -> Result<(), ClientError>;

    /// Media region closest to this client.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnsupportedCapability` when no locator is
    /// configured and `ClientError::Provisioning` when the lookup fails.
    async fn nearest_media_region(&self) -> Result<String, ClientError> {
        Err(ClientError::UnsupportedCapability(
            "nearest media region lookup".to_string(),
        ))
    }
}
