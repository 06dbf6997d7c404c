//! Participant roster and active speaker state.

pub mod active_speaker;
pub mod store;

pub use active_speaker::{apply_ranking, apply_scores};
pub use store::{
    display_name_for, PresenceChange, RosterEntry, RosterRow, RosterSnapshot, RosterStore,
    SpeakerBadge,
};
