//! Unit identifiers and allocation.
//!
//! A [`UnitId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and a *slot index* in the low 32 bits. The generation is bumped
//! every time a slot is recycled, so an id held across a unit's death can never
//! alias the unit that later reuses the slot.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// UnitId
// ---------------------------------------------------------------------------

/// A generational unit identifier, stable for the lifetime of one unit.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(u64);

impl UnitId {
    /// Construct a `UnitId` from a slot index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation, as handed to hosts.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// UnitAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles [`UnitId`]s with generational tracking.
///
/// Free slots are kept in a FIFO queue so recycling is spread over all slots
/// instead of hammering the most recently freed one.
#[derive(Debug, Default)]
pub struct UnitAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
}

impl UnitAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh [`UnitId`], reusing a freed slot when one is queued.
    pub fn allocate(&mut self) -> UnitId {
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on release.
            self.alive[index as usize] = true;
            UnitId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            UnitId::new(index, 0)
        }
    }

    /// Release a unit's slot and bump its generation.
    ///
    /// Returns `false` if the id was already dead or stale.
    pub fn release(&mut self, id: UnitId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        true
    }

    /// Returns `true` if `id` names a live unit of the current generation.
    pub fn is_alive(&self, id: UnitId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }

    /// Number of live units.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Number of slots ever allocated (live or free).
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_unique_ids() {
        let mut alloc = UnitAllocator::new();
        let ids: Vec<UnitId> = (0..64).map(|_| alloc.allocate()).collect();
        let mut indices: Vec<u32> = ids.iter().map(|id| id.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 64);
    }

    #[test]
    fn recycled_slot_gets_new_generation() {
        let mut alloc = UnitAllocator::new();
        let first = alloc.allocate();
        assert!(alloc.release(first));
        let second = alloc.allocate();
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), 1);
        assert_ne!(first, second);
    }

    #[test]
    fn stale_id_stays_dead_after_recycle() {
        let mut alloc = UnitAllocator::new();
        let first = alloc.allocate();
        alloc.release(first);
        let _second = alloc.allocate();
        assert!(!alloc.is_alive(first));
    }

    #[test]
    fn double_release_returns_false() {
        let mut alloc = UnitAllocator::new();
        let id = alloc.allocate();
        assert!(alloc.release(id));
        assert!(!alloc.release(id));
    }

    #[test]
    fn alive_count_tracks_releases() {
        let mut alloc = UnitAllocator::new();
        let a = alloc.allocate();
        let _b = alloc.allocate();
        assert_eq!(alloc.alive_count(), 2);
        alloc.release(a);
        assert_eq!(alloc.alive_count(), 1);
        assert_eq!(alloc.slot_count(), 2);
    }

    #[test]
    fn raw_roundtrip_and_display() {
        let id = UnitId::new(42, 7);
        assert_eq!(UnitId::from_raw(id.to_raw()), id);
        assert_eq!(id.to_string(), "42v7");
    }
}
