//! Ordered set of every frame currently addressable in the cache.
//!
//! The index is a pure derivative: authoritative snapshot data lives in the
//! rings and the reserved map, and the manager keeps this set equal to the
//! union of their frames. All operations are O(log n).

use std::collections::BTreeSet;
use std::ops::Bound;

/// Sorted set of frame numbers with closest-at-or-before queries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameIndex {
    frames: BTreeSet<u32>,
}

impl FrameIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a frame. Returns `false` if it was already present.
    pub fn insert(&mut self, frame: u32) -> bool {
        self.frames.insert(frame)
    }

    /// Removes a frame. Returns `false` if it was not present.
    pub fn remove(&mut self, frame: u32) -> bool {
        self.frames.remove(&frame)
    }

    /// Membership test.
    #[must_use]
    pub fn contains(&self, frame: u32) -> bool {
        self.frames.contains(&frame)
    }

    /// The highest indexed frame, if any.
    #[must_use]
    pub fn max(&self) -> Option<u32> {
        self.frames.last().copied()
    }

    /// The greatest indexed frame at or before `frame`.
    #[must_use]
    pub fn closest_at_or_before(&self, frame: u32) -> Option<u32> {
        self.frames.range(..=frame).next_back().copied()
    }

    /// Whether any indexed frame lies strictly between `lo` and `hi`
    /// (both bounds excluded).
    #[must_use]
    pub fn has_strictly_between(&self, lo: u32, hi: u32) -> bool {
        if lo >= hi {
            return false;
        }
        self.frames
            .range((Bound::Excluded(lo), Bound::Excluded(hi)))
            .next()
            .is_some()
    }

    /// Drops every member greater than `frame`. Returns `true` if anything
    /// was removed.
    pub fn truncate_after(&mut self, frame: u32) -> bool {
        let Some(first_removed) = frame.checked_add(1) else {
            return false;
        };
        !self.frames.split_off(&first_removed).is_empty()
    }

    /// Number of indexed frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Removes all frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Iterates frames in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.frames.iter().copied()
    }
}
