//! Cache Module
//!
//! In-memory working set that every read is served from.
//!
//! ## Responsibilities
//! - O(1) key lookups, inserts and removals
//! - Track entries changed in memory but not yet written (`dirty`)
//! - Track keys removed in memory whose files may still be on disk
//!
//! ## Data Structure Choice
//! A plain `HashMap` with no internal locking: the `Store` wraps it in a
//! single `RwLock` and serializes all writers, so the cache itself knows
//! nothing about persistence or threads.

mod table;

pub use table::{Cache, Iter};

/// Entry stored in the Cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// The live value
    pub value: V,

    /// Changed in memory, not yet on disk
    pub dirty: bool,
}
