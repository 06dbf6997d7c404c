//! Meetings known to this process, keyed by title.
//!
//! The first join for a title creates the meeting; concurrent joins wait on
//! the same creation and later joins reuse it. A failed creation leaves the
//! entry empty so the next join retries with a fresh request token.

use common::provisioning::MeetingInfo;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

#[derive(Default)]
pub struct MeetingRegistry {
    meetings: Mutex<HashMap<String, Arc<OnceCell<MeetingInfo>>>>,
}

impl MeetingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the meeting for `title`, running `create` if none exists yet.
    ///
    /// # Errors
    ///
    /// Propagates the error of the `create` call this caller ran.
    pub async fn get_or_create<F, Fut, E>(&self, title: &str, create: F) -> Result<MeetingInfo, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MeetingInfo, E>>,
    {
        let cell = {
            let mut meetings = self.meetings.lock().await;
            Arc::clone(meetings.entry(title.to_string()).or_default())
        };

        if cell.initialized() {
            debug!(target: "provisioning.registry", title = %title, "Reusing meeting");
        }
        let meeting = cell.get_or_try_init(create).await?;
        Ok(meeting.clone())
    }

    /// The created meeting for `title`, if any.
    pub async fn lookup(&self, title: &str) -> Option<MeetingInfo> {
        self.meetings
            .lock()
            .await
            .get(title)
            .and_then(|cell| cell.get().cloned())
    }

    /// Forget `title`; the next join creates a new meeting.
    pub async fn forget(&self, title: &str) -> Option<MeetingInfo> {
        let removed = self.meetings.lock().await.remove(title);
        removed.and_then(|cell| cell.get().cloned())
    }

    /// Number of titles with a created meeting.
    pub async fn len(&self) -> usize {
        self.meetings
            .lock()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
