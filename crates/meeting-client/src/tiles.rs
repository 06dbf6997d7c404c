//! Display slot allocation for remote video tiles.
//!
//! A fixed grid of [`MAX_SLOTS`] positions is shared by an unbounded set of
//! remote tiles. Slots are handed out lowest index first so the grid stays
//! densely packed from the top-left.
//!
//! Tile ids are stable for the whole meeting; slot bindings are not. A tile
//! keeps its slot until it is released, and acquiring a tile that is already
//! bound returns its existing slot rather than binding it twice.

use crate::errors::ClientError;
use common::types::TileId;
use tracing::{debug, warn};

/// Number of remote display slots.
pub const MAX_SLOTS: usize = 17;

/// Returned by [`TileOrganizer::release`] for a tile that holds no slot.
pub const RELEASE_SENTINEL: usize = MAX_SLOTS;

/// Index into the display grid, in `[0, MAX_SLOTS)`.
pub type SlotIndex = usize;

/// Slot table mapping display positions to remote tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileOrganizer {
    slots: [Option<TileId>; MAX_SLOTS],
    bound: usize,
}

impl Default for TileOrganizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TileOrganizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_SLOTS],
            bound: 0,
        }
    }

    /// Bind `tile_id` to a slot, or return the slot it already holds.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::CapacityExceeded` when every slot is bound.
    /// The caller drops the tile; the session carries on.
    pub fn acquire(&mut self, tile_id: TileId) -> Result<SlotIndex, ClientError> {
        if let Some(slot) = self.slot_of(tile_id) {
            return Ok(slot);
        }

        let Some((slot, free)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, bound)| bound.is_none())
        else {
            warn!(
                target: "client.tiles",
                tile_id = %tile_id,
                max_slots = MAX_SLOTS,
                "No display slot available, dropping tile"
            );
            return Err(ClientError::CapacityExceeded {
                max_slots: MAX_SLOTS,
            });
        };

        *free = Some(tile_id);
        self.bound += 1;
        debug!(target: "client.tiles", tile_id = %tile_id, slot, bound = self.bound, "Tile bound");
        Ok(slot)
    }

    /// Unbind `tile_id` and return the freed slot.
    ///
    /// Releasing a tile that holds no slot is a no-op returning
    /// [`RELEASE_SENTINEL`]; duplicate removal signals are expected when
    /// presence and unsubscribe events race.
    pub fn release(&mut self, tile_id: TileId) -> SlotIndex {
        let Some((slot, bound)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, bound)| **bound == Some(tile_id))
        else {
            debug!(target: "client.tiles", tile_id = %tile_id, "Release of unbound tile ignored");
            return RELEASE_SENTINEL;
        };

        *bound = None;
        self.bound = self.bound.saturating_sub(1);
        debug!(target: "client.tiles", tile_id = %tile_id, slot, bound = self.bound, "Tile released");
        slot
    }

    /// Slot currently bound to `tile_id`.
    #[must_use]
    pub fn slot_of(&self, tile_id: TileId) -> Option<SlotIndex> {
        self.slots.iter().position(|bound| *bound == Some(tile_id))
    }

    /// Tile currently bound to `slot`.
    #[must_use]
    pub fn tile_at(&self, slot: SlotIndex) -> Option<TileId> {
        self.slots.get(slot).copied().flatten()
    }

    /// Number of bound slots.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.bound
    }

    /// Copy of the slot table for rendering.
    #[must_use]
    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            slots: self.slots.to_vec(),
        }
    }

    /// Unbind every slot.
    pub fn clear(&mut self) {
        self.slots = [None; MAX_SLOTS];
        self.bound = 0;
    }
}

/// Slot-to-tile mapping published to the rendering shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    /// One entry per slot, `MAX_SLOTS` long.
    pub slots: Vec<Option<TileId>>,
}

impl Default for SlotSnapshot {
    fn default() -> Self {
        TileOrganizer::new().snapshot()
    }
}

impl SlotSnapshot {
    /// Bound `(slot, tile)` pairs in slot order.
    pub fn bound(&self) -> impl Iterator<Item = (SlotIndex, TileId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, tile)| tile.map(|tile| (slot, tile)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_fills_lowest_slot_first() {
        let mut organizer = TileOrganizer::new();
        assert_eq!(organizer.acquire(TileId(10)).unwrap(), 0);
        assert_eq!(organizer.acquire(TileId(11)).unwrap(), 1);
        assert_eq!(organizer.acquire(TileId(12)).unwrap(), 2);

        assert_eq!(organizer.release(TileId(11)), 1);
        // The hole at 1 is reused before slot 3
        assert_eq!(organizer.acquire(TileId(13)).unwrap(), 1);
        assert_eq!(organizer.bound_count(), 3);
    }

    #[test]
    fn test_reacquire_returns_same_slot_without_state_change() {
        let mut organizer = TileOrganizer::new();
        let first = organizer.acquire(TileId(7)).unwrap();
        let before = organizer.clone();
        let second = organizer.acquire(TileId(7)).unwrap();

        assert_eq!(first, second);
        assert_eq!(organizer, before);
        assert_eq!(organizer.bound_count(), 1);
    }

    #[test]
    fn test_release_unknown_returns_sentinel() {
        let mut organizer = TileOrganizer::new();
        organizer.acquire(TileId(1)).unwrap();

        assert_eq!(organizer.release(TileId(99)), RELEASE_SENTINEL);
        assert_eq!(organizer.bound_count(), 1);
    }

    #[test]
    fn test_double_release_is_noop() {
        let mut organizer = TileOrganizer::new();
        organizer.acquire(TileId(1)).unwrap();

        assert_eq!(organizer.release(TileId(1)), 0);
        assert_eq!(organizer.release(TileId(1)), RELEASE_SENTINEL);
        assert_eq!(organizer.bound_count(), 0);
    }

    #[test]
    fn test_capacity_exceeded_keeps_existing_bindings() {
        let mut organizer = TileOrganizer::new();
        for i in 0..MAX_SLOTS {
            let tile = TileId(u32::try_from(i).unwrap());
            assert_eq!(organizer.acquire(tile).unwrap(), i);
        }

        let result = organizer.acquire(TileId(1000));
        assert!(matches!(
            result,
            Err(ClientError::CapacityExceeded { max_slots: MAX_SLOTS })
        ));
        assert_eq!(organizer.bound_count(), MAX_SLOTS);

        // A bound tile can still be re-acquired at capacity
        assert_eq!(organizer.acquire(TileId(3)).unwrap(), 3);

        // Freeing one slot makes room again
        organizer.release(TileId(5));
        assert_eq!(organizer.acquire(TileId(1000)).unwrap(), 5);
    }

    #[test]
    fn test_bound_count_tracks_acquires_minus_releases() {
        let mut organizer = TileOrganizer::new();
        let mut expected = 0usize;

        // Deterministic interleaving of acquires and releases with unique ids
        for round in 0u32..60 {
            let tile = TileId(round % 23);
            if round % 3 == 2 {
                if organizer.release(tile) != RELEASE_SENTINEL {
                    expected -= 1;
                }
            } else if organizer.slot_of(tile).is_none() && organizer.acquire(tile).is_ok() {
                expected += 1;
            }
            assert_eq!(organizer.bound_count(), expected);
            assert!(organizer.bound_count() <= MAX_SLOTS);
            assert_eq!(organizer.snapshot().bound().count(), expected);
        }
    }

    #[test]
    fn test_lookups_and_snapshot() {
        let mut organizer = TileOrganizer::new();
        organizer.acquire(TileId(4)).unwrap();
        organizer.acquire(TileId(8)).unwrap();

        assert_eq!(organizer.slot_of(TileId(8)), Some(1));
        assert_eq!(organizer.tile_at(0), Some(TileId(4)));
        assert_eq!(organizer.tile_at(2), None);
        assert_eq!(organizer.tile_at(MAX_SLOTS + 3), None);

        let snapshot = organizer.snapshot();
        assert_eq!(snapshot.slots.len(), MAX_SLOTS);
        assert_eq!(
            snapshot.bound().collect::<Vec<_>>(),
            vec![(0, TileId(4)), (1, TileId(8))]
        );

        organizer.clear();
        assert_eq!(organizer.bound_count(), 0);
        assert_eq!(organizer.snapshot(), SlotSnapshot::default());
    }
}
