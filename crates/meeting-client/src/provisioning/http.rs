//! HTTP provisioning client.
//!
//! Both endpoints are `POST` with query parameters and no body:
//! - `{base}join?title=..&name=..&region=..` returns `{"JoinInfo": ...}`
//! - `{base}end?title=..` returns `{"status": true, "message": ...}`
//!
//! Any response whose JSON carries an `error` field is a failure, whatever
//! its status code. The optional nearest-region locator is a plain `GET`
//! returning `{"region": ...}`.

use super::region::NearestRegionResponse;
use super::{JoinRequest, ProvisioningClient};
use crate::config::ClientConfig;
use crate::errors::ClientError;
use common::provisioning::{ErrorResponse, JoinInfo, JoinResponse};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Connect timeout for provisioning requests.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP client for the provisioning service.
#[derive(Clone)]
pub struct HttpProvisioningClient {
    client: Client,
    /// Base URL ending in `/`.
    base_url: String,
    nearest_region_url: Option<String>,
}

impl HttpProvisioningClient {
    /// Create a client for `base_url` (normalized to end in `/`).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "client.provisioning", error = %e, "Failed to build HTTP client");
                ClientError::Internal(format!("failed to build HTTP client: {e}"))
            })?;

        let mut base_url = base_url.trim_end_matches('/').to_string();
        base_url.push('/');

        Ok(Self {
            client,
            base_url,
            nearest_region_url: None,
        })
    }

    /// Client for the configured service and region locator.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Internal` if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Self::new(&config.base_url, config.request_timeout)?;
        Ok(match &config.nearest_region_url {
            Some(url) => client.with_nearest_region_url(url.clone()),
            None => client,
        })
    }

    /// Enable nearest media region lookups against `url`.
    #[must_use]
    pub fn with_nearest_region_url(mut self, url: impl Into<String>) -> Self {
        self.nearest_region_url = Some(url.into());
        self
    }

    async fn read_body(response: Response) -> Result<(reqwest::StatusCode, String), ClientError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(target: "client.provisioning", error = %e, "Failed to read provisioning response");
            ClientError::Provisioning(format!("failed to read response: {e}"))
        })?;

        if let Ok(ErrorResponse { error }) = serde_json::from_str::<ErrorResponse>(&body) {
            warn!(target: "client.provisioning", status = %status, error = %error, "Provisioning service returned an error");
            return Err(ClientError::Provisioning(error));
        }
        if !status.is_success() {
            warn!(target: "client.provisioning", status = %status, "Unexpected provisioning response");
            return Err(ClientError::Provisioning(format!("unexpected status {status}")));
        }
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl ProvisioningClient for HttpProvisioningClient {
    #[instrument(skip_all, fields(title = %request.title, region = %request.region))]
    async fn join(&self, request: &JoinRequest) -> Result<JoinInfo, ClientError> {
        let url = format!("{}join", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("title", request.title.as_str()),
                ("name", request.name.as_str()),
                ("region", request.region.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(target: "client.provisioning", error = %e, "Join request failed");
                ClientError::Provisioning(format!("join request failed: {e}"))
            })?;

        let (_, body) = Self::read_body(response).await?;
        let parsed: JoinResponse = serde_json::from_str(&body).map_err(|e| {
            error!(target: "client.provisioning", error = %e, "Failed to parse join response");
            ClientError::Provisioning(format!("malformed join response: {e}"))
        })?;

        let info = parsed.join_info;
        info!(
            target: "client.provisioning",
            meeting_id = %info.meeting_id(),
            attendee_id = %info.attendee_id(),
            "Joined meeting"
        );
        Ok(info)
    }

    #[instrument(skip_all, fields(title = %title))]
    async fn end(&self, title: &str) -> Result<(), ClientError> {
        let url = format!("{}end", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[("title", title)])
            .send()
            .await
            .map_err(|e| {
                warn!(target: "client.provisioning", error = %e, "End request failed");
                ClientError::Provisioning(format!("end request failed: {e}"))
            })?;

        let (status, _) = Self::read_body(response).await?;
        info!(target: "client.provisioning", status = %status, "Meeting ended");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn nearest_media_region(&self) -> Result<String, ClientError> {
        let Some(url) = self.nearest_region_url.as_deref() else {
            return Err(ClientError::UnsupportedCapability(
                "nearest media region lookup".to_string(),
            ));
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(target: "client.provisioning", error = %e, "Nearest region request failed");
            ClientError::Provisioning(format!("nearest region request failed: {e}"))
        })?;
        if !response.status().is_success() {
            return Err(ClientError::Provisioning(format!(
                "nearest region lookup returned {}",
                response.status()
            )));
        }
        let parsed: NearestRegionResponse = response.json().await.map_err(|e| {
            warn!(target: "client.provisioning", error = %e, "Malformed nearest region response");
            ClientError::Provisioning(format!("malformed nearest region response: {e}"))
        })?;

        match parsed.region.map(|region| region.trim().to_string()) {
            Some(region) if !region.is_empty() => {
                info!(target: "client.provisioning", region = %region, "Nearest media region");
                Ok(region)
            }
            _ => Err(ClientError::Provisioning(
                "Nearest media region cannot be empty".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let client =
            HttpProvisioningClient::new("http://localhost:8081///", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8081/");

        let client =
            HttpProvisioningClient::new("http://localhost:8081", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8081/");
    }

    #[test]
    fn test_from_config_carries_region_locator() {
        let vars = std::collections::HashMap::from([
            ("MEETING_BASE_URL".to_string(), "http://localhost:8081".to_string()),
            (
                "MEETING_NEAREST_REGION_URL".to_string(),
                "https://region.example/".to_string(),
            ),
        ]);
        let config = ClientConfig::from_vars(&vars).unwrap();

        let client = HttpProvisioningClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8081/");
        assert_eq!(
            client.nearest_region_url.as_deref(),
            Some("https://region.example/")
        );
    }
}
