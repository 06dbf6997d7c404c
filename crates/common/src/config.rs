//! Common configuration types for Roundtable components.

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration shared by the service binary and client shells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter directive (trace, debug, info, warn, error, or an
    /// `EnvFilter` expression)
    pub level: String,
    /// Enable JSON-formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Read `<prefix>_LOG_LEVEL` and `<prefix>_LOG_JSON` from a variable map.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::Configuration` if the JSON flag is not a boolean.
    pub fn from_vars(prefix: &str, vars: &HashMap<String, String>) -> Result<Self, CommonError> {
        let level = vars
            .get(&format!("{prefix}_LOG_LEVEL"))
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let json_key = format!("{prefix}_LOG_JSON");
        let json = match vars.get(&json_key) {
            Some(raw) => parse_bool(raw)
                .ok_or_else(|| CommonError::Configuration(format!("{json_key}={raw}")))?,
            None => false,
        };

        Ok(Self { level, json })
    }
}

/// Parse the boolean spellings accepted in environment variables.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
