//! Active speaker integration.
//!
//! Tie-break rule: the highlighted speaker is the highest-ranked id that
//! currently has a roster entry. Ranked ids without an entry (already gone,
//! or not yet present) are skipped without consuming the highlight.

use super::store::RosterStore;
use common::types::AttendeeId;
use std::collections::HashMap;
use tracing::trace;

/// Apply a speaker ranking. Returns the attendee now marked active.
pub fn apply_ranking(store: &mut RosterStore, ranked: &[AttendeeId]) -> Option<AttendeeId> {
    for entry in store.entries_mut() {
        entry.active = false;
    }

    let winner = ranked.iter().find(|id| store.contains(id))?;
    if let Some(entry) = store.get_mut(winner) {
        entry.active = true;
    }
    trace!(target: "client.active_speaker", attendee_id = %winner, "Active speaker");
    Some(winner.clone())
}

/// Apply speaker scores verbatim. Returns the number of entries updated.
pub fn apply_scores(store: &mut RosterStore, scores: &HashMap<AttendeeId, f64>) -> usize {
    scores
        .iter()
        .filter_map(|(id, score)| store.get_mut(id).map(|entry| entry.score = Some(*score)))
        .count()
}
