//! # Zwinder Core
//!
//! Primitives for the zwinder frame-indexed state cache:
//!
//! - **[`ZwinderBuffer`]**: a fixed-byte-budget FIFO ring of variably sized
//!   opaque snapshots with a frame-cadence admission policy and eviction
//!   reporting
//! - **[`FrameIndex`]**: an ordered frame set with O(log n)
//!   closest-at-or-before queries
//! - **[`wire`]**: the little-endian `i32` framing shared by the persisted
//!   blob formats
//!
//! The manager that composes these into a multi-tier cache lives in the
//! `zwinder-cache` crate.
//!
//! ## Example
//!
//! ```rust
//! use zwinder_core::{RingConfig, ZwinderBuffer};
//!
//! let mut ring = ZwinderBuffer::new(RingConfig::new(1024, 2));
//! let outcome = ring
//!     .capture(0, false, |sink| sink.write_all(b"snapshot"))
//!     .unwrap();
//! assert!(outcome.admitted);
//! assert_eq!(ring.newest_frame(), Some(0));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod index;
pub mod wire;

pub use buffer::{CaptureOutcome, EvictedState, RingConfig, ZwinderBuffer};
pub use index::FrameIndex;
