//! # Zwinder Cache
//!
//! A frame-indexed emulator-state cache for a tool-assisted movie editor.
//!
//! During playback and editing the host repeatedly asks for the snapshot at
//! an arbitrary past frame; producing one from scratch means re-running
//! emulation from the last known state. The cache keeps a dense recent
//! history and a sparser older history on a bounded memory budget:
//!
//! - **Head buffer**: every capture that advances the head lands here
//! - **Recent buffer**: absorbs the head buffer's overflow at a coarser
//!   cadence
//! - **Gap buffer**: refills holes re-opened behind the head after backward
//!   seeks
//! - **Reserved map**: caller-pinned frames (markers, branch points) and
//!   auto-promoted "ancient" anchors that keep the distant past reachable
//!
//! A global frame index answers `closest state at-or-before F` in O(log n),
//! and the whole structure serializes to a settings-free blob.
//!
//! ## Example
//!
//! ```rust
//! use std::io::Write;
//! use zwinder_cache::{CacheConfig, StateManager};
//!
//! let mut cache = StateManager::new(CacheConfig::default(), Box::new(|_| false));
//! cache.engage(b"power-on state");
//!
//! let mut source = |sink: &mut dyn Write| sink.write_all(b"frame 1 state");
//! cache.capture(1, &mut source, false)?;
//!
//! let (frame, data) = cache.get_closest(30).unwrap();
//! assert_eq!(frame, 1);
//! assert_eq!(data.as_ref(), b"frame 1 state");
//! # Ok::<(), zwinder_cache::CacheError>(())
//! ```
//!
//! The cache is single-threaded: it is driven by the emulator stepping loop
//! and assumes exclusive access. Callers multiplexing producers must
//! serialize externally.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod manager;
mod persist;
pub mod snapshot;

pub use config::CacheConfig;
pub use manager::{CacheError, ReserveCallback, Result, StateManager};
pub use snapshot::Snapshotter;
pub use zwinder_core::RingConfig;
