//! Whole-structure serialization.
//!
//! The persisted layout is a concatenation of the three ring blobs (each
//! self-delimiting, see [`ZwinderBuffer::write_to`]), then the ancient
//! interval, then the reserved records:
//!
//! ```text
//! current blob | recent blob | gap blob
//! ancient_interval : i32
//! reserved_count   : i32
//! repeated: frame (i32) | len (i32) | bytes[len]
//! ```
//!
//! All integers are little-endian. Settings are NOT part of the blob; the
//! caller supplies them again on [`StateManager::load`]. The ancient
//! interval is the one exception: it rides in-band and replaces the value
//! in the supplied config.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use bytes::Bytes;
use tracing::debug;

use zwinder_core::{wire, FrameIndex, ZwinderBuffer};

use crate::config::CacheConfig;
use crate::manager::{ReserveCallback, StateManager};

impl StateManager {
    /// Serializes the whole structure into `w`.
    ///
    /// # Errors
    ///
    /// Propagates the sink's I/O error.
    pub fn save(&self, w: &mut dyn Write) -> io::Result<()> {
        self.current.write_to(w)?;
        self.recent.write_to(w)?;
        self.gap.write_to(w)?;
        wire::write_u32(w, self.config.ancient_interval)?;
        wire::write_len(w, self.reserved.len())?;
        for (&frame, data) in &self.reserved {
            wire::write_u32(w, frame)?;
            wire::write_len(w, data.len())?;
            w.write_all(data)?;
        }
        Ok(())
    }

    /// Restores a cache from `r`.
    ///
    /// Ring budgets and frequencies come from `config`; the ancient
    /// interval comes from the stream. The frame index is rebuilt from the
    /// restored stores.
    ///
    /// # Errors
    ///
    /// Propagates the reader's I/O error; a truncated or inconsistent blob
    /// surfaces as `UnexpectedEof` or `InvalidData`.
    pub fn load(
        r: &mut dyn Read,
        config: CacheConfig,
        reserve: ReserveCallback,
    ) -> io::Result<Self> {
        let current = ZwinderBuffer::read_from(r, config.current)?;
        let recent = ZwinderBuffer::read_from(r, config.recent)?;
        let gap = ZwinderBuffer::read_from(r, config.gap)?;

        let ancient_interval = wire::read_u32(r)?;
        let count = wire::read_len(r)?;
        let mut reserved = BTreeMap::new();
        for _ in 0..count {
            let frame = wire::read_u32(r)?;
            let len = wire::read_len(r)?;
            let mut data = vec![0u8; len];
            r.read_exact(&mut data)?;
            reserved.insert(frame, Bytes::from(data));
        }

        let mut manager = Self {
            current,
            recent,
            gap,
            reserved,
            index: FrameIndex::new(),
            config: CacheConfig {
                ancient_interval,
                ..config
            },
            reserve,
        };
        manager.rebuild_index();
        debug!(states = manager.count(), "restored state history");
        Ok(manager)
    }
}
