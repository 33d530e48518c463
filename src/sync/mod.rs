//! Sync Module
//!
//! Decides when changes in the cache reach the disk.
//!
//! ## Modes
//! - **Continuous**: the store writes each mutation itself before returning.
//!   Nothing in this module runs.
//! - **Interval**: mutations only mark entries dirty. A `Flusher` thread
//!   wakes every period and asks the store to write everything pending.
//!   A crash between two passes loses the writes made since the last one.
//!
//! `clear()` is not batched in either mode: the store deletes the files
//! before returning.
//!
//! ## Flush Pass Lifecycle
//! ```text
//!  set/remove ──► cache (dirty / pending removal)
//!                     │
//!       tick ─────────┤  write lock held for the whole pass
//!                     ▼
//!              write dirty entries, delete removed keys
//!                     │
//!                     ▼
//!              mark clean (failures stay pending for the next pass)
//! ```

mod flusher;

use std::sync::atomic::{AtomicU64, Ordering};

pub use flusher::{FlushTarget, Flusher};

/// Outcome of one flush pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entry files written
    pub written: usize,

    /// Entry files deleted
    pub deleted: usize,

    /// Writes or deletes that failed and stay pending
    pub failed: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.written == 0 && self.deleted == 0 && self.failed == 0
    }
}

/// Running totals of disk activity, shared with the flusher thread
#[derive(Debug, Default)]
pub struct SyncStats {
    flush_passes: AtomicU64,
    entries_written: AtomicU64,
    entries_deleted: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of `SyncStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub flush_passes: u64,
    pub entries_written: u64,
    pub entries_deleted: u64,
    pub failures: u64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&self) {
        self.entries_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.entries_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a flush pass completed
    pub fn record_pass(&self) {
        self.flush_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            flush_passes: self.flush_passes.load(Ordering::Relaxed),
            entries_written: self.entries_written.load(Ordering::Relaxed),
            entries_deleted: self.entries_deleted.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
