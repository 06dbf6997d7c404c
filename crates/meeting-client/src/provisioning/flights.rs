//! Single-flight join requests keyed by meeting title.

use super::{JoinRequest, ProvisioningClient};
use crate::errors::ClientError;
use common::provisioning::JoinInfo;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// Deduplicates join requests per title.
///
/// The first caller for a title sends the request; concurrent callers wait
/// for its result and later callers reuse it. A failed request leaves the
/// slot empty, so the next caller retries. [`JoinFlights::forget`] drops a
/// title once its session is over.
#[derive(Default)]
pub struct JoinFlights {
    flights: Mutex<HashMap<String, Arc<OnceCell<JoinInfo>>>>,
}

impl JoinFlights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join through `client`, sharing the request with other callers for the
    /// same title.
    ///
    /// # Errors
    ///
    /// Propagates the provisioning error of the request this caller ran.
    pub async fn join(
        &self,
        client: &dyn ProvisioningClient,
        request: &JoinRequest,
    ) -> Result<JoinInfo, ClientError> {
        let cell = {
            let mut flights = self.flights.lock().await;
            Arc::clone(flights.entry(request.title.clone()).or_default())
        };

        if cell.initialized() {
            debug!(target: "client.provisioning", title = %request.title, "Reusing join result");
        }
        let info = cell.get_or_try_init(|| client.join(request)).await?;
        Ok(info.clone())
    }

    /// Drop the cached result for `title`.
    pub async fn forget(&self, title: &str) {
        self.flights.lock().await.remove(title);
    }

    /// Whether a completed join is cached for `title`.
    pub async fn is_cached(&self, title: &str) -> bool {
        self.flights
            .lock()
            .await
            .get(title)
            .is_some_and(|cell| cell.initialized())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::provisioning::{
        AttendeeEnvelope, AttendeeInfo, MediaPlacement, MeetingEnvelope, MeetingInfo,
    };
    use common::secret::SecretString;
    use common::types::{AttendeeId, MeetingId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingClient {
        joins: AtomicUsize,
        fail_first: bool,
    }

    impl CountingClient {
        fn new(fail_first: bool) -> Self {
            Self {
                joins: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    fn join_info(n: usize) -> JoinInfo {
        JoinInfo {
            meeting: MeetingEnvelope {
                meeting: MeetingInfo {
                    meeting_id: MeetingId::new("m-1").unwrap(),
                    external_meeting_id: None,
                    media_region: "us-east-1".to_string(),
                    media_placement: MediaPlacement {
                        audio_host_url: "audio".to_string(),
                        signaling_url: "signal".to_string(),
                        turn_control_url: "turn".to_string(),
                    },
                },
            },
            attendee: AttendeeEnvelope {
                attendee: AttendeeInfo {
                    attendee_id: AttendeeId::new(format!("a-{n}")).unwrap(),
                    external_user_id: "x#Alice".to_string(),
                    join_token: SecretString::from("token"),
                },
            },
        }
    }

    #[async_trait::async_trait]
    impl ProvisioningClient for CountingClient {
        async fn join(&self, _request: &JoinRequest) -> Result<JoinInfo, ClientError> {
            let n = self.joins.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail_first && n == 0 {
                return Err(ClientError::Provisioning("boom".to_string()));
            }
            Ok(join_info(n))
        }

        async fn end(&self, _title: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn request(title: &str) -> JoinRequest {
        JoinRequest {
            title: title.to_string(),
            name: "Alice".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_joins_share_one_request() {
        let flights = JoinFlights::new();
        let client = CountingClient::new(false);
        let req = request("standup");

        let (a, b) = tokio::join!(flights.join(&client, &req), flights.join(&client, &req));

        assert_eq!(client.joins.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().attendee_id(), b.unwrap().attendee_id());
        assert!(flights.is_cached("standup").await);

        flights.join(&client, &req).await.unwrap();
        assert_eq!(client.joins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_titles_are_independent() {
        let flights = JoinFlights::new();
        let client = CountingClient::new(false);

        flights.join(&client, &request("a")).await.unwrap();
        flights.join(&client, &request("b")).await.unwrap();

        assert_eq!(client.joins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_join_is_not_cached() {
        let flights = JoinFlights::new();
        let client = CountingClient::new(true);
        let req = request("standup");

        assert!(flights.join(&client, &req).await.is_err());
        assert!(!flights.is_cached("standup").await);

        flights.join(&client, &req).await.unwrap();
        assert_eq!(client.joins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_allows_a_fresh_join() {
        let flights = JoinFlights::new();
        let client = CountingClient::new(false);
        let req = request("standup");

        let first = flights.join(&client, &req).await.unwrap();
        flights.forget("standup").await;
        let second = flights.join(&client, &req).await.unwrap();

        assert_ne!(first.attendee_id(), second.attendee_id());
    }
}
