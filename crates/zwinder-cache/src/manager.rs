//! The frame-indexed state manager.
//!
//! Three decaying ring tiers plus a reserved map compose the store. Frames
//! flow from the head buffer through the recent buffer as newer captures
//! push them out; a snapshot falling off the recent buffer is either
//! promoted to the reserved map (caller pin or ancient anchor) or dropped.
//! A gap buffer fills holes re-opened behind the head after backward seeks.
//! A global [`FrameIndex`] mirrors the union of all four stores and answers
//! closest-at-or-before queries in O(log n).
//!
//! The manager is single-threaded by design: it is driven by the emulator
//! stepping loop and assumes exclusive access. Disposal is ownership —
//! dropping the manager frees every arena.

use std::collections::BTreeMap;
use std::io;
use std::ops::Bound;

use bytes::Bytes;
use tracing::{debug, info};

use zwinder_core::{EvictedState, FrameIndex, RingConfig, ZwinderBuffer};

use crate::config::CacheConfig;
use crate::snapshot::Snapshotter;

/// Decides whether a frame is pinned by the caller (markers, branch
/// points). Consulted on capture and again whenever a snapshot is about to
/// decay out of a ring, so it must be cheap and pure.
pub type ReserveCallback = Box<dyn Fn(u32) -> bool>;

/// Errors surfaced by cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Frame 0 is the permanent anchor and cannot be evicted.
    #[error("the frame 0 anchor cannot be evicted")]
    ReservedZero,

    /// I/O failure while producing or copying snapshot bytes.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Frame-indexed cache of emulator snapshots under a bounded memory budget.
pub struct StateManager {
    pub(crate) current: ZwinderBuffer,
    pub(crate) recent: ZwinderBuffer,
    pub(crate) gap: ZwinderBuffer,
    pub(crate) reserved: BTreeMap<u32, Bytes>,
    pub(crate) index: FrameIndex,
    pub(crate) config: CacheConfig,
    pub(crate) reserve: ReserveCallback,
}

impl StateManager {
    /// Creates an empty, un-engaged cache.
    ///
    /// Call [`engage`](Self::engage) with the frame-0 snapshot before
    /// querying; every query is anchored by frame 0.
    #[must_use]
    pub fn new(config: CacheConfig, reserve: ReserveCallback) -> Self {
        Self {
            current: ZwinderBuffer::new(config.current),
            recent: ZwinderBuffer::new(config.recent),
            gap: ZwinderBuffer::new(config.gap),
            reserved: BTreeMap::new(),
            index: FrameIndex::new(),
            config,
            reserve,
        }
    }

    /// Seeds the permanent frame-0 anchor. A no-op if frame 0 is already
    /// stored anywhere.
    pub fn engage(&mut self, frame0: &[u8]) {
        if !self.index.contains(0) {
            self.reserved.insert(0, Bytes::copy_from_slice(frame0));
            self.index.insert(0);
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Whether a snapshot is stored exactly at `frame`.
    #[must_use]
    pub fn has_state(&self, frame: u32) -> bool {
        self.index.contains(frame)
    }

    /// The highest stored frame. Reserved frames count, so a branch point
    /// may sit ahead of the replay head. Returns 0 before `engage`.
    #[must_use]
    pub fn last(&self) -> u32 {
        self.index.max().unwrap_or(0)
    }

    /// Total number of stored snapshots across all four stores.
    #[must_use]
    pub fn count(&self) -> usize {
        self.current.len() + self.recent.len() + self.gap.len() + self.reserved.len()
    }

    /// Total payload bytes currently held across all four stores.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.current.used_bytes()
            + self.recent.used_bytes()
            + self.gap.used_bytes()
            + self.reserved.values().map(Bytes::len).sum::<usize>()
    }

    /// Iterates every stored frame in ascending order.
    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.iter()
    }

    /// Iterates reserved frames in descending order.
    pub fn reserved_frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.reserved.keys().rev().copied()
    }

    /// The stored frame closest at-or-before `frame`, with a handle to its
    /// payload.
    ///
    /// Once engaged this never returns `None`: frame 0 anchors every query.
    /// The handle is an owned view and stays readable across later
    /// mutations of the cache.
    #[must_use]
    pub fn get_closest(&self, frame: u32) -> Option<(u32, Bytes)> {
        let stored = self.index.closest_at_or_before(frame)?;
        let data = self.fetch(stored)?;
        Some((stored, data))
    }

    /// The exact snapshot at `frame`, or an empty payload if no state is
    /// stored precisely there. Missing is not an error.
    #[must_use]
    pub fn state_at(&self, frame: u32) -> Bytes {
        if !self.index.contains(frame) {
            return Bytes::new();
        }
        self.fetch(frame).unwrap_or_else(Bytes::new)
    }

    fn fetch(&self, frame: u32) -> Option<Bytes> {
        if let Some(data) = self.reserved.get(&frame) {
            return Some(data.clone());
        }
        self.current
            .find(frame)
            .or_else(|| self.recent.find(frame))
            .or_else(|| self.gap.find(frame))
    }

    /// Absorbs a capture at `frame`.
    ///
    /// The pipeline, in order: dedup against the index; divert to the
    /// reserved map when the reserve callback pins the frame; route behind
    /// the head to the gap buffer (or drop, when coverage is already dense
    /// enough); otherwise admit to the head buffer, cascading any displaced
    /// snapshots down the tiers. `force` bypasses the head buffer's cadence
    /// check only.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the snapshot source.
    pub fn capture(
        &mut self,
        frame: u32,
        source: &mut dyn Snapshotter,
        force: bool,
    ) -> Result<()> {
        if self.index.contains(frame) {
            return Ok(());
        }
        if (self.reserve)(frame) {
            return self.capture_reserved(frame, source);
        }

        let head = self.current.newest_frame().max(self.recent.newest_frame());
        if head.is_some_and(|h| frame <= h) {
            if self.needs_gap(frame) {
                let outcome = self
                    .gap
                    .capture(frame, false, |sink| source.write_state(sink))?;
                if outcome.admitted {
                    self.index.insert(frame);
                    for evicted in outcome.evicted {
                        self.index.remove(evicted.frame);
                    }
                }
            }
            return Ok(());
        }

        let outcome = self
            .current
            .capture(frame, force, |sink| source.write_state(sink))?;
        if outcome.admitted {
            self.index.insert(frame);
            for evicted in outcome.evicted {
                self.demote_from_current(evicted);
            }
        }
        Ok(())
    }

    /// Pins a snapshot at `frame` into the reserved map. A no-op if any
    /// store already holds the frame.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the snapshot source.
    pub fn capture_reserved(&mut self, frame: u32, source: &mut dyn Snapshotter) -> Result<()> {
        if self.index.contains(frame) {
            return Ok(());
        }
        let mut payload: Vec<u8> = Vec::new();
        source.write_state(&mut payload)?;
        self.reserved.insert(frame, Bytes::from(payload));
        self.index.insert(frame);
        Ok(())
    }

    /// Removes a reserved snapshot. Absence of the key is not an error.
    ///
    /// # Errors
    ///
    /// Fails with [`CacheError::ReservedZero`] for `frame == 0`.
    pub fn evict_reserved(&mut self, frame: u32) -> Result<()> {
        if frame == 0 {
            return Err(CacheError::ReservedZero);
        }
        if self.reserved.remove(&frame).is_some() {
            self.index.remove(frame);
        }
        Ok(())
    }

    /// Removes every snapshot with a frame strictly greater than `frame`.
    /// Returns `true` iff anything was removed.
    ///
    /// Truncating the recent buffer also truncates the entire head buffer,
    /// since everything in the head logically post-dates everything recent.
    pub fn invalidate_after(&mut self, frame: u32) -> bool {
        let normal = self.invalidate_normal(frame);
        let gaps = self.invalidate_gaps(frame);
        let reserved = self.invalidate_reserved(frame);
        self.index.truncate_after(frame);

        let any = normal || gaps || reserved;
        if any {
            debug!(frame, "invalidated history after frame");
        }
        any
    }

    /// Truncates all three rings, resets the reserved map to its frame-0
    /// entry, and resets the index to match.
    pub fn clear(&mut self) {
        self.current.clear();
        self.recent.clear();
        self.gap.clear();
        self.reserved.retain(|&frame, _| frame == 0);
        self.index.clear();
        if self.reserved.contains_key(&0) {
            self.index.insert(0);
        }
    }

    /// Installs new settings.
    ///
    /// Rings whose config is unchanged are kept as-is. A changed ring is
    /// rebuilt; with `keep_old_states` its entries are re-admitted in order
    /// (caller-pinned frames diverting to the reserved map), otherwise they
    /// are discarded. Widening the ancient interval with `keep_old_states`
    /// re-thins the auto-promoted anchors to the new spacing; without
    /// `keep_old_states` every non-pinned reserved frame except 0 is
    /// evicted. The index is rebuilt from scratch afterwards.
    pub fn update_settings(&mut self, config: CacheConfig, keep_old_states: bool) {
        info!(keep_old_states, "updating cache settings");
        let old_interval = self.config.ancient_interval;
        {
            let Self {
                current,
                recent,
                gap,
                reserved,
                reserve,
                ..
            } = self;
            let reserve = reserve.as_ref();

            Self::rebuild_ring(current, config.current, keep_old_states, reserve, reserved);
            Self::rebuild_ring(recent, config.recent, keep_old_states, reserve, reserved);
            Self::rebuild_ring(gap, config.gap, keep_old_states, reserve, reserved);

            if keep_old_states {
                if config.ancient_interval > old_interval {
                    Self::thin_anchors(reserved, reserve, config.ancient_interval);
                }
            } else {
                reserved.retain(|&frame, _| frame == 0 || reserve(frame));
            }
        }
        self.config = config;
        self.rebuild_index();
    }

    /// Rebuilds the index from the authoritative stores.
    pub(crate) fn rebuild_index(&mut self) {
        let Self {
            current,
            recent,
            gap,
            reserved,
            index,
            ..
        } = self;
        index.clear();
        for (frame, _) in current.iter().chain(recent.iter()).chain(gap.iter()) {
            index.insert(frame);
        }
        for &frame in reserved.keys() {
            index.insert(frame);
        }
    }

    fn rebuild_ring(
        slot: &mut ZwinderBuffer,
        config: RingConfig,
        keep_old_states: bool,
        reserve: &dyn Fn(u32) -> bool,
        reserved: &mut BTreeMap<u32, Bytes>,
    ) {
        if slot.matches_config(&config) {
            return;
        }
        let old = std::mem::replace(slot, ZwinderBuffer::new(config));
        if keep_old_states {
            for (frame, data) in old.into_entries() {
                if reserve(frame) {
                    reserved.insert(frame, data);
                } else {
                    slot.capture_bytes(frame, data, true);
                }
            }
        }
    }

    /// Walks anchors in ascending order, evicting each non-pinned key that
    /// sits closer than `interval` to the last kept one.
    fn thin_anchors(
        reserved: &mut BTreeMap<u32, Bytes>,
        reserve: &dyn Fn(u32) -> bool,
        interval: u32,
    ) {
        let keys: Vec<u32> = reserved.keys().copied().collect();
        let mut last_kept: Option<u32> = None;
        for key in keys {
            match last_kept {
                None => last_kept = Some(key),
                Some(anchor) => {
                    if !reserve(key) && key - anchor < interval {
                        reserved.remove(&key);
                    } else {
                        last_kept = Some(key);
                    }
                }
            }
        }
    }

    /// A snapshot displaced from the head buffer moves down to the recent
    /// buffer unless the caller pins it; the demotion is forced so the
    /// coarser tier cannot refuse it on cadence.
    fn demote_from_current(&mut self, state: EvictedState) {
        self.index.remove(state.frame);
        if (self.reserve)(state.frame) {
            self.reserved.insert(state.frame, state.data);
            self.index.insert(state.frame);
            return;
        }
        let outcome = self.recent.capture_bytes(state.frame, state.data, true);
        if outcome.admitted {
            self.index.insert(state.frame);
        }
        for evicted in outcome.evicted {
            self.retire_from_recent(evicted);
        }
    }

    /// A snapshot displaced from the recent buffer survives only as a
    /// reserved entry: caller pins always, ancient anchors when no other
    /// reserved frame is near.
    fn retire_from_recent(&mut self, state: EvictedState) {
        self.index.remove(state.frame);
        if (self.reserve)(state.frame) || !self.has_nearby_reserved(state.frame) {
            debug!(frame = state.frame, "promoting long-term anchor");
            self.reserved.insert(state.frame, state.data);
            self.index.insert(state.frame);
        }
    }

    /// Whether a reserved frame lies strictly within `ancient_interval` of
    /// `frame` on either side. Frames below the interval are always near:
    /// frame 0 anchors them.
    fn has_nearby_reserved(&self, frame: u32) -> bool {
        let interval = self.config.ancient_interval;
        if frame < interval {
            return true;
        }
        let lo = frame - interval;
        let hi = frame.saturating_add(interval);
        if lo >= hi {
            return false;
        }
        self.reserved
            .range((Bound::Excluded(lo), Bound::Excluded(hi)))
            .next()
            .is_some()
    }

    /// Whether a backward capture at `frame` lands in genuinely sparse
    /// territory. Uses the gap buffer's cadence when it holds anything,
    /// else the head buffer's.
    fn needs_gap(&self, frame: u32) -> bool {
        let frequency = if self.gap.is_empty() {
            self.current.rewind_frequency()
        } else {
            self.gap.rewind_frequency()
        };
        !self
            .index
            .has_strictly_between(frame.saturating_sub(frequency), frame)
    }

    fn invalidate_normal(&mut self, frame: u32) -> bool {
        let recent_at = self.recent.iter().position(|(f, _)| f > frame);
        if let Some(at) = recent_at {
            let dropped = self.recent.invalidate_from(at) + self.current.invalidate_from(0);
            return dropped > 0;
        }
        let current_at = self.current.iter().position(|(f, _)| f > frame);
        if let Some(at) = current_at {
            return self.current.invalidate_from(at) > 0;
        }
        false
    }

    fn invalidate_gaps(&mut self, frame: u32) -> bool {
        let gap_at = self.gap.iter().position(|(f, _)| f > frame);
        match gap_at {
            Some(at) => self.gap.invalidate_from(at) > 0,
            None => false,
        }
    }

    fn invalidate_reserved(&mut self, frame: u32) -> bool {
        let before = self.reserved.len();
        self.reserved.retain(|&f, _| f <= frame);
        self.reserved.len() != before
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("current", &self.current.len())
            .field("recent", &self.recent.len())
            .field("gap", &self.gap.len())
            .field("reserved", &self.reserved.len())
            .field("last", &self.last())
            .finish_non_exhaustive()
    }
}
