//! Common error types for Roundtable components.

use thiserror::Error;

/// Common errors that can occur across Roundtable components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// An identifier was empty or malformed
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias using `CommonError`
pub type Result<T> = std::result::Result<T, CommonError>;

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        CommonError::Serialization(err.to_string())
    }
}
