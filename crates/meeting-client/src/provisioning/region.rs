//! Media region selection.
//!
//! Unless a region is pinned in configuration, the client asks a locator
//! endpoint for the nearest media region at startup and preselects it,
//! adding it to the picker when it is not one of the configured regions. A
//! failed lookup keeps the configured default.

use crate::errors::ClientError;
use serde::Deserialize;

/// Body returned by the nearest-region locator.
#[derive(Debug, Clone, Deserialize)]
pub struct NearestRegionResponse {
    #[serde(default)]
    pub region: Option<String>,
}

/// Regions offered by the picker and the one join requests use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRegions {
    supported: Vec<String>,
    selected: String,
}

impl MediaRegions {
    /// `selected` is added to `supported` if missing.
    #[must_use]
    pub fn new(mut supported: Vec<String>, selected: impl Into<String>) -> Self {
        let selected = selected.into();
        if !supported.contains(&selected) {
            supported.push(selected.clone());
        }
        Self {
            supported,
            selected,
        }
    }

    #[must_use]
    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    #[must_use]
    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Preselect the region the locator reported. Returns whether it had to
    /// be added to the supported list.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Provisioning` for an empty region.
    pub fn adopt_nearest(&mut self, nearest: &str) -> Result<bool, ClientError> {
        let nearest = nearest.trim();
        if nearest.is_empty() {
            return Err(ClientError::Provisioning(
                "Nearest media region cannot be empty".to_string(),
            ));
        }
        let added = !self.supported.iter().any(|region| region == nearest);
        if added {
            self.supported.push(nearest.to_string());
        }
        self.selected = nearest.to_string();
        Ok(added)
    }

    /// Pick one of the supported regions.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if `region` is not offered.
    pub fn select(&mut self, region: &str) -> Result<(), ClientError> {
        if !self.supported.iter().any(|supported| supported == region) {
            return Err(ClientError::Config(format!(
                "unsupported media region: {region}"
            )));
        }
        self.selected = region.to_string();
        Ok(())
    }
}
