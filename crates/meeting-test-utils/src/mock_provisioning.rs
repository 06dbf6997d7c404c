//! In-memory provisioning client.
//!
//! Behaves like the provisioning service: one meeting per title, a fresh
//! attendee per join. Counts calls so tests can check deduplication.

use crate::fixtures::JoinInfoBuilder;
use async_trait::async_trait;
use common::provisioning::{truncate_external_id, JoinInfo};
use meeting_client::errors::ClientError;
use meeting_client::provisioning::{JoinRequest, ProvisioningClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockProvisioningInner {
    meetings: HashMap<String, String>,
    requests: Vec<JoinRequest>,
    ended: Vec<String>,
    delay: Duration,
    fail_join: Option<String>,
    fail_end: Option<String>,
    nearest_region: Option<String>,
}

/// Mock provisioning client.
#[derive(Clone, Default)]
pub struct MockProvisioning {
    inner: Arc<Mutex<MockProvisioningInner>>,
    joins: Arc<AtomicUsize>,
    ends: Arc<AtomicUsize>,
}

impl MockProvisioning {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every join response (to widen race windows).
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner.lock().unwrap().delay = delay;
        self
    }

    /// Joins fail with `message`.
    #[must_use]
    pub fn failing_join(self, message: &str) -> Self {
        self.set_fail_join(Some(message));
        self
    }

    /// End requests fail with `message`.
    #[must_use]
    pub fn failing_end(self, message: &str) -> Self {
        self.inner.lock().unwrap().fail_end = Some(message.to_string());
        self
    }

    /// Report `region` from the nearest region lookup. Without it the lookup
    /// is unsupported.
    #[must_use]
    pub fn with_nearest_region(self, region: &str) -> Self {
        self.inner.lock().unwrap().nearest_region = Some(region.to_string());
        self
    }

    pub fn set_fail_join(&self, message: Option<&str>) {
        self.inner.lock().unwrap().fail_join = message.map(str::to_string);
    }

    /// Join requests that reached the mock.
    #[must_use]
    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn end_count(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<JoinRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    #[must_use]
    pub fn ended_titles(&self) -> Vec<String> {
        self.inner.lock().unwrap().ended.clone()
    }

    /// Meeting id handed out for `title`, if it was created.
    #[must_use]
    pub fn meeting_id_for(&self, title: &str) -> Option<String> {
        self.inner.lock().unwrap().meetings.get(title).cloned()
    }
}

#[async_trait]
impl ProvisioningClient for MockProvisioning {
    async fn join(&self, request: &JoinRequest) -> Result<JoinInfo, ClientError> {
        let attempt = self.joins.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(request.clone());
            inner.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = inner.fail_join.clone() {
            return Err(ClientError::Provisioning(message));
        }
        let meeting_id = inner
            .meetings
            .entry(request.title.clone())
            .or_insert_with(|| format!("meeting-{attempt:04}"))
            .clone();

        Ok(JoinInfoBuilder::new()
            .meeting_id(meeting_id)
            .external_meeting_id(truncate_external_id(&request.title))
            .media_region(request.region.clone())
            .attendee_id(format!("attendee-{attempt}"))
            .external_user_id(truncate_external_id(&format!("0a1b2c3d#{}", request.name)))
            .build())
    }

    async fn end(&self, title: &str) -> Result<(), ClientError> {
        self.ends.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = inner.fail_end.clone() {
            return Err(ClientError::Provisioning(message));
        }
        if inner.meetings.remove(title).is_none() {
            return Err(ClientError::Provisioning(format!("Meeting not found: {title}")));
        }
        inner.ended.push(title.to_string());
        Ok(())
    }

    async fn nearest_media_region(&self) -> Result<String, ClientError> {
        self.inner
            .lock()
            .unwrap()
            .nearest_region
            .clone()
            .ok_or_else(|| ClientError::UnsupportedCapability("nearest media region lookup".into()))
    }
}
