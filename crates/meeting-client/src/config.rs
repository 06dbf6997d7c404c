//! Meeting client configuration.
//!
//! Configuration is loaded from environment variables (or a variable map in
//! tests) with defaults for everything except the provisioning base URL.

use common::config::{parse_bool, LoggingConfig};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default media region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default audio meter step interval (one rendering frame at ~60 Hz).
pub const DEFAULT_METER_FRAME_MS: u64 = 16;

/// Default attendee presence timeout handed to the facade.
pub const DEFAULT_PRESENCE_TIMEOUT_MS: u64 = 5000;

/// Default provisioning request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Active speaker score interval when scores are shown.
pub const SPEAKER_SCORE_INTERVAL_MS: u64 = 100;

/// Display name used by the recorder role.
pub const RECORDER_DISPLAY_NAME: &str = "«Meeting Recorder»";

/// How this client participates in the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticipantRole {
    /// Regular attendee with a microphone.
    #[default]
    Attendee,
    /// Headless recorder; never captures audio.
    Recorder,
    /// Headless broadcaster; never captures audio.
    Broadcaster,
}

impl ParticipantRole {
    /// Recorder and broadcaster never open a microphone.
    #[must_use]
    pub fn captures_audio(self) -> bool {
        matches!(self, ParticipantRole::Attendee)
    }
}

impl FromStr for ParticipantRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attendee" => Ok(ParticipantRole::Attendee),
            "recorder" => Ok(ParticipantRole::Recorder),
            "broadcaster" => Ok(ParticipantRole::Broadcaster),
            other => Err(ConfigError::InvalidValue(format!("MEETING_ROLE={other}"))),
        }
    }
}

/// Meeting client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Provisioning service base URL (e.g. "http://localhost:8081/").
    pub base_url: String,

    /// Media region requested when creating a meeting (default: "us-east-1").
    pub region: String,

    /// `MEETING_REGION` was set explicitly; the nearest region lookup is
    /// skipped.
    pub region_pinned: bool,

    /// Regions offered by the region picker. Always contains `region`.
    pub supported_regions: Vec<String>,

    /// Nearest media region locator, queried at startup when the region is
    /// not pinned.
    pub nearest_region_url: Option<String>,

    /// Ask for confirmation before ending the meeting for everyone.
    pub confirm_end: bool,

    /// Deliver active speaker scores (100 ms interval) instead of rankings only.
    pub show_speaker_scores: bool,

    /// Participation role.
    pub role: ParticipantRole,

    /// Audio meter step interval.
    pub meter_frame_interval: Duration,

    /// Attendee presence timeout handed to the facade.
    pub presence_timeout: Duration,

    /// Enable simulcast uplink in the facade.
    pub enable_simulcast: bool,

    /// Provisioning request timeout.
    pub request_timeout: Duration,

    /// Logging settings for embedding shells.
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn bool_var(vars: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match vars.get(key) {
        Some(raw) => parse_bool(raw).ok_or_else(|| ConfigError::InvalidValue(format!("{key}={raw}"))),
        None => Ok(false),
    }
}

fn u64_var(vars: &HashMap<String, String>, key: &str, default: u64) -> Result<u64, ConfigError> {
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw}"))),
        None => Ok(default),
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut base_url = vars
            .get("MEETING_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("MEETING_BASE_URL".to_string()))?
            .trim()
            .to_string();
        if base_url.is_empty() {
            return Err(ConfigError::InvalidValue("MEETING_BASE_URL is empty".to_string()));
        }
        // Endpoints are joined as `{base}join`, so keep exactly one trailing slash
        while base_url.ends_with('/') {
            base_url.pop();
        }
        base_url.push('/');

        let pinned_region = vars
            .get("MEETING_REGION")
            .map(|region| region.trim().to_string())
            .filter(|region| !region.is_empty());
        let region_pinned = pinned_region.is_some();
        let region = pinned_region.unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut supported_regions: Vec<String> = vars
            .get("MEETING_SUPPORTED_REGIONS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|region| !region.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !supported_regions.contains(&region) {
            supported_regions.insert(0, region.clone());
        }

        let nearest_region_url = vars
            .get("MEETING_NEAREST_REGION_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let role = match vars.get("MEETING_ROLE") {
            Some(raw) => raw.parse()?,
            None => ParticipantRole::default(),
        };

        let meter_frame_ms = u64_var(vars, "MEETING_METER_FRAME_MS", DEFAULT_METER_FRAME_MS)?;
        if meter_frame_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "MEETING_METER_FRAME_MS must be positive".to_string(),
            ));
        }

        let logging = LoggingConfig::from_vars("MEETING", vars)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(ClientConfig {
            base_url,
            region,
            region_pinned,
            supported_regions,
            nearest_region_url,
            confirm_end: bool_var(vars, "MEETING_CONFIRM_END")?,
            show_speaker_scores: bool_var(vars, "MEETING_SHOW_SPEAKER_SCORES")?,
            role,
            meter_frame_interval: Duration::from_millis(meter_frame_ms),
            presence_timeout: Duration::from_millis(u64_var(
                vars,
                "MEETING_PRESENCE_TIMEOUT_MS",
                DEFAULT_PRESENCE_TIMEOUT_MS,
            )?),
            enable_simulcast: bool_var(vars, "MEETING_ENABLE_SIMULCAST")?,
            request_timeout: Duration::from_secs(u64_var(
                vars,
                "MEETING_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            logging,
        })
    }

    /// Interval at which the facade should deliver active speaker scores.
    /// Zero disables score delivery.
    #[must_use]
    pub fn speaker_score_interval(&self) -> Duration {
        if self.show_speaker_scores {
            Duration::from_millis(SPEAKER_SCORE_INTERVAL_MS)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "MEETING_BASE_URL".to_string(),
            "http://localhost:8081".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = ClientConfig::from_vars(&base_vars()).expect("Config should load");

        assert_eq!(config.base_url, "http://localhost:8081/");
        assert_eq!(config.region, DEFAULT_REGION);
        assert!(!config.region_pinned);
        assert_eq!(config.supported_regions, vec![DEFAULT_REGION.to_string()]);
        assert!(config.nearest_region_url.is_none());
        assert!(!config.confirm_end);
        assert!(!config.show_speaker_scores);
        assert_eq!(config.role, ParticipantRole::Attendee);
        assert_eq!(
            config.meter_frame_interval,
            Duration::from_millis(DEFAULT_METER_FRAME_MS)
        );
        assert_eq!(
            config.presence_timeout,
            Duration::from_millis(DEFAULT_PRESENCE_TIMEOUT_MS)
        );
        assert_eq!(config.speaker_score_interval(), Duration::ZERO);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("MEETING_BASE_URL".to_string(), "https://meet.example/v2//".to_string());
        vars.insert("MEETING_REGION".to_string(), "eu-central-1".to_string());
        vars.insert("MEETING_CONFIRM_END".to_string(), "true".to_string());
        vars.insert("MEETING_SHOW_SPEAKER_SCORES".to_string(), "1".to_string());
        vars.insert("MEETING_ROLE".to_string(), "Recorder".to_string());
        vars.insert("MEETING_METER_FRAME_MS".to_string(), "33".to_string());

        let config = ClientConfig::from_vars(&vars).expect("Config should load");

        assert_eq!(config.base_url, "https://meet.example/v2/");
        assert_eq!(config.region, "eu-central-1");
        assert!(config.region_pinned);
        assert!(config.confirm_end);
        assert_eq!(config.speaker_score_interval(), Duration::from_millis(100));
        assert_eq!(config.role, ParticipantRole::Recorder);
        assert!(!config.role.captures_audio());
        assert_eq!(config.meter_frame_interval, Duration::from_millis(33));
    }

    #[test]
    fn test_supported_regions_always_include_default() {
        let mut vars = base_vars();
        vars.insert(
            "MEETING_SUPPORTED_REGIONS".to_string(),
            "eu-west-1, ap-south-1,,".to_string(),
        );
        vars.insert(
            "MEETING_NEAREST_REGION_URL".to_string(),
            "https://region.example/".to_string(),
        );

        let config = ClientConfig::from_vars(&vars).expect("Config should load");

        assert_eq!(
            config.supported_regions,
            vec!["us-east-1", "eu-west-1", "ap-south-1"]
        );
        assert_eq!(
            config.nearest_region_url.as_deref(),
            Some("https://region.example/")
        );
    }

    #[test]
    fn test_from_vars_missing_base_url() {
        let result = ClientConfig::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "MEETING_BASE_URL"));
    }

    #[test]
    fn test_from_vars_rejects_bad_values() {
        let mut vars = base_vars();
        vars.insert("MEETING_ROLE".to_string(), "speaker".to_string());
        assert!(matches!(
            ClientConfig::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut vars = base_vars();
        vars.insert("MEETING_METER_FRAME_MS".to_string(), "0".to_string());
        assert!(matches!(
            ClientConfig::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut vars = base_vars();
        vars.insert("MEETING_CONFIRM_END".to_string(), "sure".to_string());
        assert!(matches!(
            ClientConfig::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
