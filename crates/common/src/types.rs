//! Common data types for Roundtable components.

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between an attendee's base identifier and its modality suffix.
pub const MODALITY_SEPARATOR: char = '#';

/// Opaque meeting identifier issued by the provisioning service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(String);

impl MeetingId {
    /// Wrap a provisioning-issued meeting identifier.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::InvalidIdentifier` if the identifier is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, CommonError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CommonError::InvalidIdentifier(
                "meeting id is empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secondary stream carried under an attendee identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Screen or content share stream.
    Content,
    /// Any modality this client does not know about.
    Other(String),
}

impl Modality {
    /// Wire name of the content modality.
    pub const CONTENT: &'static str = "content";

    fn parse(suffix: &str) -> Self {
        if suffix == Self::CONTENT {
            Modality::Content
        } else {
            Modality::Other(suffix.to_string())
        }
    }
}

/// Opaque attendee identifier issued by the provisioning service.
///
/// An identifier may carry one modality suffix (`<base>#content`). Anything
/// other than exactly one separator is treated as a plain identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendeeId(String);

impl AttendeeId {
    /// Wrap an attendee identifier.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::InvalidIdentifier` if the identifier is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, CommonError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CommonError::InvalidIdentifier(
                "attendee id is empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> Option<(&str, &str)> {
        let mut parts = self.0.split(MODALITY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(suffix), None) if !base.is_empty() && !suffix.is_empty() => {
                Some((base, suffix))
            }
            _ => None,
        }
    }

    /// The modality suffix, if the identifier carries exactly one.
    #[must_use]
    pub fn modality(&self) -> Option<Modality> {
        self.split().map(|(_, suffix)| Modality::parse(suffix))
    }

    /// Whether this identifier carries the given modality.
    #[must_use]
    pub fn has_modality(&self, modality: &Modality) -> bool {
        self.modality().as_ref() == Some(modality)
    }

    /// The identifier without its modality suffix.
    #[must_use]
    pub fn base_id(&self) -> &str {
        self.split().map_or(self.0.as_str(), |(base, _)| base)
    }
}

impl fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a rendered video feed, stable for the whole meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
