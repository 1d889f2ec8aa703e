//! Decaying ring buffer of emulator snapshots.
//!
//! A [`ZwinderBuffer`] is a fixed-byte-budget FIFO of variably sized opaque
//! snapshots. Captures are admitted subject to a frame-cadence policy
//! ([`RingConfig::rewind_frequency`]); admitting a snapshot that would
//! overflow the budget pushes the oldest entries out. Evictions are reported
//! back to the caller as a [`CaptureOutcome`], so the owner of several tiers
//! can decide where a displaced snapshot goes next.
//!
//! Entries are kept in non-decreasing frame order. Captures that run
//! backwards in time are refused by the cadence check; `force` bypasses the
//! cadence but callers must still feed non-decreasing frames.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use bytes::Bytes;

use crate::wire;

/// Admission and capacity settings for a [`ZwinderBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Total payload budget in bytes. A single snapshot larger than the
    /// whole budget is still admitted alone; the budget bounds the steady
    /// state, not one entry.
    pub size_bytes: usize,
    /// Minimum frame delta between admitted captures. A value of 0 behaves
    /// as 1.
    pub rewind_frequency: u32,
}

impl RingConfig {
    /// Creates a config from a byte budget and a capture cadence.
    #[must_use]
    pub fn new(size_bytes: usize, rewind_frequency: u32) -> Self {
        Self {
            size_bytes,
            rewind_frequency,
        }
    }
}

/// A snapshot pushed out of a ring to make room for a newer one.
#[derive(Debug, Clone)]
pub struct EvictedState {
    /// Frame the snapshot was captured at.
    pub frame: u32,
    /// The snapshot payload.
    pub data: Bytes,
}

/// Result of a capture attempt.
#[derive(Debug, Default)]
pub struct CaptureOutcome {
    /// Whether the snapshot was admitted.
    pub admitted: bool,
    /// Entries dropped from the old end to make room, oldest first. Always
    /// empty when the capture was refused.
    pub evicted: Vec<EvictedState>,
}

impl CaptureOutcome {
    fn refused() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
struct StateEntry {
    frame: u32,
    data: Bytes,
}

/// Fixed-byte-budget FIFO of variably sized snapshots.
#[derive(Debug)]
pub struct ZwinderBuffer {
    config: RingConfig,
    entries: VecDeque<StateEntry>,
    used_bytes: usize,
}

impl ZwinderBuffer {
    /// Creates an empty buffer with the given settings.
    #[must_use]
    pub fn new(config: RingConfig) -> Self {
        Self {
            config,
            entries: VecDeque::new(),
            used_bytes: 0,
        }
    }

    /// The cadence this buffer admits captures at, never less than 1.
    #[must_use]
    pub fn rewind_frequency(&self) -> u32 {
        self.config.rewind_frequency.max(1)
    }

    /// Whether this buffer was built from settings equal to `config`.
    #[must_use]
    pub fn matches_config(&self, config: &RingConfig) -> bool {
        self.config == *config
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total payload bytes currently held.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Frame of the newest stored snapshot, if any.
    #[must_use]
    pub fn newest_frame(&self) -> Option<u32> {
        self.entries.back().map(|e| e.frame)
    }

    /// Whether a non-forced capture at `frame` would pass the cadence check.
    #[must_use]
    pub fn accepts(&self, frame: u32) -> bool {
        match self.newest_frame() {
            None => true,
            Some(newest) => frame >= newest.saturating_add(self.rewind_frequency()),
        }
    }

    /// Captures a snapshot produced by `fill`.
    ///
    /// `fill` is only invoked once the cadence check has passed, so refused
    /// captures cost nothing. Evicted entries are returned oldest first.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `fill`; the buffer is unchanged in that
    /// case.
    pub fn capture<F>(&mut self, frame: u32, force: bool, fill: F) -> io::Result<CaptureOutcome>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        if !force && !self.accepts(frame) {
            return Ok(CaptureOutcome::refused());
        }
        let mut payload: Vec<u8> = Vec::new();
        fill(&mut payload)?;
        Ok(self.admit(frame, Bytes::from(payload)))
    }

    /// Captures an already-materialized payload. Used when a snapshot is
    /// handed down from a faster tier.
    pub fn capture_bytes(&mut self, frame: u32, data: Bytes, force: bool) -> CaptureOutcome {
        if !force && !self.accepts(frame) {
            return CaptureOutcome::refused();
        }
        self.admit(frame, data)
    }

    fn admit(&mut self, frame: u32, data: Bytes) -> CaptureOutcome {
        debug_assert!(
            self.newest_frame().map_or(true, |newest| frame >= newest),
            "ring frames must be non-decreasing"
        );
        let mut evicted = Vec::new();
        while self.used_bytes + data.len() > self.config.size_bytes {
            let Some(old) = self.entries.pop_front() else {
                break;
            };
            self.used_bytes -= old.data.len();
            evicted.push(EvictedState {
                frame: old.frame,
                data: old.data,
            });
        }
        self.used_bytes += data.len();
        self.entries.push_back(StateEntry { frame, data });
        CaptureOutcome {
            admitted: true,
            evicted,
        }
    }

    /// Snapshot at position `index` (0 is the oldest), as a cheap handle.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<(u32, Bytes)> {
        self.entries.get(index).map(|e| (e.frame, e.data.clone()))
    }

    /// Payload of the snapshot captured exactly at `frame`, if present.
    #[must_use]
    pub fn find(&self, frame: u32) -> Option<Bytes> {
        self.entries
            .binary_search_by_key(&frame, |e| e.frame)
            .ok()
            .map(|i| self.entries[i].data.clone())
    }

    /// Iterates `(frame, payload)` pairs oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Bytes)> + '_ {
        self.entries.iter().map(|e| (e.frame, &e.data))
    }

    /// Drops every entry at position `index` and beyond. Returns how many
    /// entries were removed.
    pub fn invalidate_from(&mut self, index: usize) -> usize {
        let mut dropped = 0;
        while self.entries.len() > index {
            if let Some(e) = self.entries.pop_back() {
                self.used_bytes -= e.data.len();
                dropped += 1;
            }
        }
        dropped
    }

    /// Removes all snapshots, keeping the settings.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.used_bytes = 0;
    }

    /// Consumes the buffer, yielding `(frame, payload)` pairs oldest first.
    pub fn into_entries(self) -> impl Iterator<Item = (u32, Bytes)> {
        self.entries.into_iter().map(|e| (e.frame, e.data))
    }

    /// Serializes the buffer contents as a self-delimiting blob: an entry
    /// count, then `{frame, len, bytes}` records, all integers little-endian
    /// `i32`. Settings are not part of the blob.
    ///
    /// # Errors
    ///
    /// Propagates the sink's I/O error.
    pub fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        wire::write_len(w, self.entries.len())?;
        for e in &self.entries {
            wire::write_u32(w, e.frame)?;
            wire::write_len(w, e.data.len())?;
            w.write_all(&e.data)?;
        }
        Ok(())
    }

    /// Parses a blob written by [`write_to`](Self::write_to), adopting the
    /// supplied settings.
    ///
    /// Entries exceeding `config.size_bytes` are accepted as-is (they were
    /// valid under the settings that wrote them); later captures evict back
    /// down to budget.
    ///
    /// # Errors
    ///
    /// Propagates the reader's I/O error; out-of-order frames surface as
    /// `InvalidData`.
    pub fn read_from(r: &mut dyn Read, config: RingConfig) -> io::Result<Self> {
        let count = wire::read_len(r)?;
        let mut entries = VecDeque::new();
        let mut used_bytes = 0;
        let mut previous: Option<u32> = None;
        for _ in 0..count {
            let frame = wire::read_u32(r)?;
            let len = wire::read_len(r)?;
            let mut data = vec![0u8; len];
            r.read_exact(&mut data)?;
            if previous.is_some_and(|p| frame < p) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "ring frames out of order",
                ));
            }
            previous = Some(frame);
            used_bytes += data.len();
            entries.push_back(StateEntry {
                frame,
                data: Bytes::from(data),
            });
        }
        Ok(Self {
            config,
            entries,
            used_bytes,
        })
    }
}
