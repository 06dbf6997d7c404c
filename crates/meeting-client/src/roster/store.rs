//! Per-attendee presence and audio state.
//!
//! The store mirrors the facade's presence callbacks: an entry exists exactly
//! while the facade reports the attendee present. Presence is level-triggered,
//! so a repeated "present" for a known attendee only confirms the entry and
//! never refreshes its display name.

use common::provisioning::EXTERNAL_USER_ID_SEPARATOR;
use common::types::{AttendeeId, Modality};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Appended to the display name of content-share attendees.
pub const CONTENT_SUFFIX: &str = " «Content»";

/// Roster state for one attendee.
///
/// Everything except the display name stays unknown (`None`) until the first
/// event that carries it.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub display_name: String,
    /// Volume percentage, 0-100.
    pub volume: Option<u8>,
    pub muted: Option<bool>,
    /// Signal strength percentage, 0-100.
    pub signal_strength: Option<u8>,
    /// Highlighted as the current speaker. At most one entry at a time.
    pub active: bool,
    pub score: Option<f64>,
}

impl RosterEntry {
    fn new(display_name: String) -> Self {
        Self {
            display_name,
            volume: None,
            muted: None,
            signal_strength: None,
            active: false,
            score: None,
        }
    }

    /// Status badge shown next to the name.
    #[must_use]
    pub fn badge(&self) -> SpeakerBadge {
        if self.signal_strength.is_some_and(|s| s < 1) {
            SpeakerBadge::WeakSignal
        } else if self.muted == Some(true) {
            SpeakerBadge::Muted
        } else if self.active {
            SpeakerBadge::Speaking
        } else if self.volume.is_some_and(|v| v > 0) {
            SpeakerBadge::Audible
        } else {
            SpeakerBadge::Idle
        }
    }
}

/// Status badge for a roster row, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerBadge {
    WeakSignal,
    Muted,
    Speaking,
    Audible,
    Idle,
}

impl SpeakerBadge {
    /// Badge text; empty when the badge is color-only.
    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            SpeakerBadge::Muted => "MUTED",
            SpeakerBadge::Speaking => "SPEAKING",
            SpeakerBadge::WeakSignal | SpeakerBadge::Audible | SpeakerBadge::Idle => "",
        }
    }
}

/// Effect of a presence callback on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    Added,
    AlreadyPresent,
    Removed,
    AlreadyAbsent,
}

/// Derive a display name from an external user id (`<prefix>#<name>`).
///
/// Takes the text after the last separator (the whole label if there is
/// none) and marks content-share attendees.
#[must_use]
pub fn display_name_for(attendee_id: &AttendeeId, external_user_id: &str) -> String {
    let name = external_user_id
        .rsplit(EXTERNAL_USER_ID_SEPARATOR)
        .next()
        .unwrap_or(external_user_id);
    if attendee_id.has_modality(&Modality::Content) {
        format!("{name}{CONTENT_SUFFIX}")
    } else {
        name.to_string()
    }
}

/// Convert a normalized `[0, 1]` reading to a rounded percentage.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn to_percent(normalized: f64) -> u8 {
    if normalized.is_nan() {
        return 0;
    }
    (normalized * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Roster keyed by attendee id.
#[derive(Debug, Default, Clone)]
pub struct RosterStore {
    entries: BTreeMap<AttendeeId, RosterEntry>,
}

impl RosterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a presence callback.
    pub fn on_presence(
        &mut self,
        attendee_id: &AttendeeId,
        present: bool,
        external_user_id: &str,
        dropped: bool,
    ) -> PresenceChange {
        if !present {
            let removed = self.entries.remove(attendee_id).is_some();
            info!(
                target: "client.roster",
                attendee_id = %attendee_id,
                external_user_id,
                dropped,
                "Attendee left"
            );
            return if removed {
                PresenceChange::Removed
            } else {
                PresenceChange::AlreadyAbsent
            };
        }

        if self.entries.contains_key(attendee_id) {
            return PresenceChange::AlreadyPresent;
        }

        let display_name = display_name_for(attendee_id, external_user_id);
        info!(
            target: "client.roster",
            attendee_id = %attendee_id,
            display_name = %display_name,
            "Attendee present"
        );
        self.entries
            .insert(attendee_id.clone(), RosterEntry::new(display_name));
        PresenceChange::Added
    }

    /// Apply a volume indicator callback.
    ///
    /// `None` fields mean "unknown, keep the previous value". Returns false
    /// (and changes nothing) for an attendee with no entry, which happens when
    /// a volume update races a departure.
    pub fn on_volume_update(
        &mut self,
        attendee_id: &AttendeeId,
        volume: Option<f64>,
        muted: Option<bool>,
        signal_strength: Option<f64>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(attendee_id) else {
            debug!(
                target: "client.roster",
                attendee_id = %attendee_id,
                "Volume update for unknown attendee ignored"
            );
            return false;
        };

        if let Some(volume) = volume {
            entry.volume = Some(to_percent(volume));
        }
        if let Some(muted) = muted {
            entry.muted = Some(muted);
        }
        if let Some(signal_strength) = signal_strength {
            entry.signal_strength = Some(to_percent(signal_strength));
        }
        true
    }

    #[must_use]
    pub fn get(&self, attendee_id: &AttendeeId) -> Option<&RosterEntry> {
        self.entries.get(attendee_id)
    }

    pub(crate) fn get_mut(&mut self, attendee_id: &AttendeeId) -> Option<&mut RosterEntry> {
        self.entries.get_mut(attendee_id)
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut RosterEntry> {
        self.entries.values_mut()
    }

    #[must_use]
    pub fn contains(&self, attendee_id: &AttendeeId) -> bool {
        self.entries.contains_key(attendee_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttendeeId, &RosterEntry)> {
        self.entries.iter()
    }

    /// Drop every entry (used when leaving).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Rendering view of the current roster.
    #[must_use]
    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            rows: self
                .entries
                .iter()
                .map(|(attendee_id, entry)| RosterRow {
                    attendee_id: attendee_id.clone(),
                    badge: entry.badge(),
                    entry: entry.clone(),
                })
                .collect(),
        }
    }
}

/// One row of the participant list.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRow {
    pub attendee_id: AttendeeId,
    pub entry: RosterEntry,
    pub badge: SpeakerBadge,
}

/// Participant list published to the rendering shell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterSnapshot {
    pub rows: Vec<RosterRow>,
}

impl RosterSnapshot {
    #[must_use]
    pub fn row(&self, attendee_id: &AttendeeId) -> Option<&RosterRow> {
        self.rows.iter().find(|row| &row.attendee_id == attendee_id)
    }

    /// The highlighted speaker, if any.
    #[must_use]
    pub fn active_speaker(&self) -> Option<&AttendeeId> {
        self.rows
            .iter()
            .find(|row| row.entry.active)
            .map(|row| &row.attendee_id)
    }
}
