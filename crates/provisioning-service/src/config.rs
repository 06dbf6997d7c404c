//! Provisioning service configuration.
//!
//! Configuration is loaded from environment variables with defaults for
//! local development.

use common::config::LoggingConfig;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Region of the media backend's control plane.
pub const DEFAULT_CONTROL_REGION: &str = "us-east-1";

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 0;

/// Prefix for the shared logging variables (`PROVISIONING_LOG_LEVEL`,
/// `PROVISIONING_LOG_JSON`).
pub const LOG_PREFIX: &str = "PROVISIONING";

/// Provisioning service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8081").
    pub bind_address: SocketAddr,

    /// Control-plane region of the media backend. Meetings themselves are
    /// hosted in the media region each join request names.
    pub control_region: String,

    /// Seconds to keep draining connections after a shutdown signal.
    pub drain_seconds: u64,

    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let raw_bind = vars
            .get("PROVISIONING_BIND_ADDRESS")
            .map(String::as_str)
            .unwrap_or(DEFAULT_BIND_ADDRESS);
        let bind_address = raw_bind
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "PROVISIONING_BIND_ADDRESS".to_string(),
                reason: format!("'{raw_bind}': {e}"),
            })?;

        let control_region = match vars.get("PROVISIONING_CONTROL_REGION") {
            Some(region) if region.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    key: "PROVISIONING_CONTROL_REGION".to_string(),
                    reason: "must not be empty".to_string(),
                })
            }
            Some(region) => region.trim().to_string(),
            None => DEFAULT_CONTROL_REGION.to_string(),
        };

        let drain_seconds = match vars.get("PROVISIONING_DRAIN_SECONDS") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "PROVISIONING_DRAIN_SECONDS".to_string(),
                reason: format!("'{raw}': {e}"),
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        let logging =
            LoggingConfig::from_vars(LOG_PREFIX, vars).map_err(|e| ConfigError::InvalidValue {
                key: format!("{LOG_PREFIX}_LOG_JSON"),
                reason: e.to_string(),
            })?;

        Ok(Self {
            bind_address,
            control_region,
            drain_seconds,
            logging,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.bind_address.to_string(), DEFAULT_BIND_ADDRESS);
        assert_eq!(config.control_region, DEFAULT_CONTROL_REGION);
        assert_eq!(config.drain_seconds, 0);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("PROVISIONING_BIND_ADDRESS", "127.0.0.1:9000"),
            ("PROVISIONING_CONTROL_REGION", "eu-west-1"),
            ("PROVISIONING_DRAIN_SECONDS", "5"),
            ("PROVISIONING_LOG_JSON", "true"),
            ("PROVISIONING_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.control_region, "eu-west-1");
        assert_eq!(config.drain_seconds, 5);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_bind_address() {
        let result = Config::from_vars(&vars(&[("PROVISIONING_BIND_ADDRESS", "not-an-addr")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key, .. }) if key == "PROVISIONING_BIND_ADDRESS"
        ));
    }

    #[test]
    fn test_empty_region_rejected() {
        let result = Config::from_vars(&vars(&[("PROVISIONING_CONTROL_REGION", "  ")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_invalid_log_json_flag() {
        let result = Config::from_vars(&vars(&[("PROVISIONING_LOG_JSON", "sometimes")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key, .. }) if key == "PROVISIONING_LOG_JSON"
        ));
    }
}
