//! Common utilities for Lumen.
//!
//! This crate provides the foundational types shared by the Lumen format crates:
//!
//! - [`BinaryReader`] - Zero-copy binary reading from byte slices
//! - [`SubStream`] - Growable seekable byte streams
//! - [`StringPool`] - Deduplicating NUL-terminated string tables
//! - [`SubStreamOrchestrator`] - Multi-region writer with delayed pointers
//! - [`IndexedList`] - Insertion-ordered lists with lookup by key

mod error;
mod indexed;
mod orchestrator;
mod reader;
mod stream;
mod string_pool;

pub use error::{Error, Result};
pub use indexed::{FxHashMap, FxHashSet, IndexedList, Keyed};
pub use orchestrator::{PointerId, PointerWidth, StreamId, SubStreamOrchestrator};
pub use reader::BinaryReader;
pub use stream::SubStream;
pub use string_pool::StringPool;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Re-export memchr for SIMD-accelerated byte searching
pub use memchr;
