//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Attendee join
//! tokens travel through the client as `SecretString`, so any struct that
//! derives `Debug` over them redacts the token automatically.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Credentials {
//!     attendee_id: String,
//!     join_token: SecretString,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let creds = Credentials {
//!     attendee_id: "att-1".to_string(),
//!     join_token: SecretString::from("join-token"),
//! };
//!
//! println!("{:?}", creds);
//! let token: &str = creds.join_token.expose_secret();
//! ```
//!
//! # Serde Integration
//!
//! Secrets deserialize directly. Serializing one requires opting in with
//! [`serialize_exposed`], which the provisioning service uses when it hands a
//! join token to the attendee it belongs to.

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};

use serde::Serializer;

/// Serialize a secret by exposing it.
///
/// Use with `#[serde(serialize_with = "common::secret::serialize_exposed")]`
/// only on response types whose recipient owns the secret.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize_exposed<S: Serializer>(
    secret: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
