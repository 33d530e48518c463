//! Engine Module
//!
//! The persistent store that ties cache, serializer, files and flusher together.
//!
//! ## Responsibilities
//! - Rebuild the cache from disk on startup
//! - Serve every read from memory
//! - Route mutations to disk: write-through or batched
//! - Final flush on shutdown

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::cache::Cache;
use crate::config::{Config, SyncMode};
use crate::error::{Result, StoreError};
use crate::keymap;
use crate::serializer::{Record, Serializer};
use crate::storage::FileStore;
use crate::sync::{FlushReport, FlushTarget, Flusher, StatsSnapshot, SyncStats};

/// An embedded key-value store mirrored to one file per key
///
/// ## Concurrency Model: Single Writer / Multiple Readers
///
/// - **Mutations** (set/remove/clear/flush): serialized by `write_lock`,
///   including the flusher's passes, so a flush never observes a half-done
///   mutation and per-key disk order matches cache order
///
/// - **Reads** (get/keys/values): take only the cache read lock and never
///   touch disk
///
/// `Store` is `Send + Sync`; share it with `Arc` to use it from several threads.
pub struct Store<V: Clone + Send + Sync + 'static> {
    /// State shared with the flusher thread
    shared: Arc<Shared<V>>,

    /// Background flusher (interval mode only)
    flusher: Option<Flusher>,

    /// Store configuration
    config: Config<V>,

    /// Resolved sync mode
    mode: SyncMode,

    /// Set once the final flush has run
    closed: bool,
}

/// Everything the flusher thread needs
struct Shared<V> {
    /// Working set (internal RwLock)
    cache: RwLock<Cache<V>>,

    /// Entry files on disk
    files: FileStore,

    /// Entry text format
    serializer: Arc<dyn Serializer<V>>,

    /// Serializes mutations and flush passes
    write_lock: Mutex<()>,

    /// Disk activity counters
    stats: SyncStats,

    /// Emit per-operation events
    logging: bool,
}

impl<V: Clone + Send + Sync + 'static> Store<V> {
    /// Open or create a store with the given config (blocking)
    ///
    /// On startup:
    /// 1. Validate config
    /// 2. Create the directory if it doesn't exist
    /// 3. Sweep temp files left by interrupted writes
    /// 4. Decode every entry file into the cache (corrupt ones are skipped)
    /// 5. Start the flusher in interval mode
    pub fn open(config: Config<V>) -> Result<Self> {
        config.validate()?;
        let mode = config.sync_mode();

        if config.continuous && config.flush_interval.is_some() {
            tracing::warn!(
                dir = %config.dir.display(),
                "flush interval ignored: continuous mode writes every change through"
            );
        }

        let files = FileStore::new(&config.dir, config.text_encoding);

        // Step 1: Directory
        files.ensure_directory().map_err(|e| {
            StoreError::Initialization(format!(
                "cannot create storage directory {}: {}",
                config.dir.display(),
                e
            ))
        })?;

        // Step 2: Leftovers from a crash mid-write
        let swept = files.remove_stale_temp_files().map_err(|e| {
            StoreError::Initialization(format!(
                "cannot scan storage directory {}: {}",
                config.dir.display(),
                e
            ))
        })?;
        if swept > 0 {
            tracing::warn!(dir = %config.dir.display(), swept, "removed stale temp files");
        }

        // Step 3: Rebuild the cache
        let cache = Self::load(&files, config.serializer.as_ref())?;

        if config.logging {
            tracing::info!(
                dir = %config.dir.display(),
                entries = cache.len(),
                mode = ?mode,
                serializer = config.serializer.name(),
                encoding = %config.text_encoding,
                "store opened"
            );
        }

        let shared = Arc::new(Shared {
            cache: RwLock::new(cache),
            files,
            serializer: Arc::clone(&config.serializer),
            write_lock: Mutex::new(()),
            stats: SyncStats::new(),
            logging: config.logging,
        });

        // Step 4: Flusher
        let flusher = match mode {
            SyncMode::Interval { period } => Some(Flusher::start(Arc::clone(&shared), period)?),
            SyncMode::Continuous => None,
        };

        Ok(Self {
            shared,
            flusher,
            config,
            mode,
            closed: false,
        })
    }

    /// Open with a directory (convenience method)
    ///
    /// Uses the default JSON config, write-through.
    pub fn open_path(path: &Path) -> Result<Self>
    where
        V: serde::Serialize + serde::de::DeserializeOwned,
    {
        Self::open(Config::builder().dir(path).build())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value by key. Never touches disk.
    pub fn get_item(&self, key: &str) -> Option<V> {
        self.shared.cache.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.cache.read().contains_key(key)
    }

    /// Number of stored keys
    pub fn length(&self) -> usize {
        self.shared.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.cache.read().is_empty()
    }

    /// Snapshot of all keys (arbitrary order)
    pub fn keys(&self) -> Vec<String> {
        self.shared.cache.read().keys().map(str::to_owned).collect()
    }

    /// Snapshot of all values (arbitrary order)
    pub fn values(&self) -> Vec<V> {
        self.shared.cache.read().values().cloned().collect()
    }

    /// Snapshot of all key/value pairs (arbitrary order)
    pub fn entries(&self) -> Vec<(String, V)> {
        self.shared
            .cache
            .read()
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    /// Call `f` for every pair in a snapshot taken now
    ///
    /// No lock is held while `f` runs, so it may call back into the store;
    /// such changes are not seen by the remaining calls.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &V),
    {
        for (key, value) in self.entries() {
            f(&key, &value);
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Store a value, returning it
    ///
    /// Steps:
    /// 1. Encode (failure leaves the cache untouched)
    /// 2. Acquire write lock
    /// 3. Update cache
    /// 4. Continuous: write the file before returning
    ///
    /// A disk failure in step 4 is returned but the cache keeps the new
    /// value; the entry stays dirty and is retried by `flush`/`shutdown`.
    pub fn set_item(&self, key: &str, value: V) -> Result<V> {
        validate_key(key)?;

        let text = self.shared.serializer.encode(key, &value)?;
        self.shared.files.encoding().check(&text)?;

        let _write_guard = self.shared.write_lock.lock();

        self.shared
            .cache
            .write()
            .insert(key.to_string(), value.clone(), true);

        if self.shared.logging {
            tracing::debug!(key, bytes = text.len(), "set");
        }

        if self.mode == SyncMode::Continuous {
            self.shared.write_text(key, &text)?;
        }

        Ok(value)
    }

    /// Remove a key. Removing a missing key is not an error.
    pub fn remove_item(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let _write_guard = self.shared.write_lock.lock();

        let existed = self.shared.cache.write().remove(key).is_some();

        if self.shared.logging {
            tracing::debug!(key, existed, "remove");
        }

        if self.mode == SyncMode::Continuous {
            self.shared.delete_file(key)?;
        }

        Ok(())
    }

    /// Remove every key and delete its file, in both sync modes
    ///
    /// Deletion is attempted for every key; the first failure is returned
    /// and failed keys stay pending for the next flush.
    pub fn clear(&self) -> Result<()> {
        let _write_guard = self.shared.write_lock.lock();

        let keys = self.shared.cache.write().clear();
        let mut first_error = None;

        for key in &keys {
            if let Err(e) = self.shared.delete_file(key) {
                self.shared.cache.write().mark_removal_pending(key);
                first_error.get_or_insert(e);
            }
        }

        if self.shared.logging {
            tracing::info!(keys = keys.len(), "cleared");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Write everything pending now, whatever the mode
    ///
    /// Returns the first failure; failed entries stay pending.
    pub fn flush(&self) -> Result<FlushReport> {
        let (report, first_error) = self.shared.flush_pass();
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Write (or delete) the file for one key now, whatever the mode
    pub fn persist_key(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let _write_guard = self.shared.write_lock.lock();

        let text = {
            let cache = self.shared.cache.read();
            cache
                .get(key)
                .map(|value| self.shared.serializer.encode(key, value))
                .transpose()?
        };

        match text {
            Some(text) => self.shared.write_text(key, &text),
            None => self.shared.delete_file(key),
        }
    }

    /// Stop the flusher and write everything pending
    ///
    /// Dropping a store does the same, logging instead of returning errors.
    pub fn shutdown(mut self) -> Result<FlushReport> {
        self.close()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the storage directory path
    pub fn dir(&self) -> &Path {
        self.shared.files.dir()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config<V> {
        &self.config
    }

    /// Get the resolved sync mode
    pub fn sync_mode(&self) -> SyncMode {
        self.mode
    }

    /// Dirty entries plus removals not yet on disk
    pub fn pending_count(&self) -> usize {
        self.shared.cache.read().pending_count()
    }

    /// Disk activity totals
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Decode every entry file into a fresh cache
    fn load(files: &FileStore, serializer: &dyn Serializer<V>) -> Result<Cache<V>> {
        let init_error = |e: StoreError| {
            StoreError::Initialization(format!(
                "cannot read storage directory {}: {}",
                files.dir().display(),
                e
            ))
        };

        let mut cache = Cache::new();

        for name in files.list_entries().map_err(init_error)? {
            let name = name.map_err(init_error)?;

            match Self::load_entry(files, serializer, &name) {
                Ok(Some(record)) => {
                    cache.insert(record.key, record.value, false);
                }
                // Vanished between listing and reading
                Ok(None) => {}
                Err(e @ StoreError::CorruptEntry { .. }) => {
                    tracing::warn!(file = %name, error = %e, "skipping corrupt entry");
                }
                Err(e) => return Err(init_error(e)),
            }
        }

        Ok(cache)
    }

    fn load_entry(
        files: &FileStore,
        serializer: &dyn Serializer<V>,
        name: &str,
    ) -> Result<Option<Record<V>>> {
        let Some(text) = files.read_entry(name)? else {
            return Ok(None);
        };

        let record = serializer.decode(&text).map_err(|e| StoreError::CorruptEntry {
            file: name.to_string(),
            reason: e.to_string(),
        })?;

        if keymap::map_key(&record.key) != name {
            return Err(StoreError::CorruptEntry {
                file: name.to_string(),
                reason: format!("stored key {:?} does not map to this file", record.key),
            });
        }

        Ok(Some(record))
    }

    fn close(&mut self) -> Result<FlushReport> {
        if let Some(mut flusher) = self.flusher.take() {
            flusher.stop();
        }
        self.closed = true;

        let result = self.flush();
        if self.config.logging {
            tracing::info!(dir = %self.dir().display(), "store closed");
        }
        result
    }
}

impl<V: Clone + Send + Sync + 'static> Drop for Store<V> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close() {
            tracing::error!(dir = %self.dir().display(), error = %e, "final flush failed");
        }
    }
}

impl<V> Shared<V> {
    /// Write entry text for `key` and mark it clean (write lock held)
    fn write_text(&self, key: &str, text: &str) -> Result<()> {
        match self.files.write_entry(&keymap::map_key(key), text) {
            Ok(()) => {
                self.cache.write().mark_clean(key);
                self.stats.record_write();
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    /// Delete the file for `key` and drop its pending removal (write lock held)
    fn delete_file(&self, key: &str) -> Result<()> {
        match self.files.delete_entry(&keymap::map_key(key)) {
            Ok(()) => {
                self.cache.write().clear_removal(key);
                self.stats.record_delete();
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    /// Write every dirty entry and delete every removed key
    ///
    /// Holds the write lock for the whole pass. Everything that fails stays
    /// pending; the first error is handed back alongside the report.
    fn flush_pass(&self) -> (FlushReport, Option<StoreError>) {
        let _write_guard = self.write_lock.lock();

        let (dirty, removals) = {
            let cache = self.cache.read();
            (cache.dirty_keys(), cache.pending_removals())
        };

        let mut report = FlushReport::default();
        let mut first_error = None;

        for key in removals {
            match self.delete_file(&key) {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "flush: delete failed, will retry");
                    report.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        for key in dirty {
            let text = {
                let cache = self.cache.read();
                match cache.get(&key) {
                    Some(value) => self.serializer.encode(&key, value),
                    None => continue,
                }
            };

            match text.and_then(|text| self.write_text(&key, &text)) {
                Ok(()) => report.written += 1,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "flush: write failed, will retry");
                    report.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        self.stats.record_pass();

        if self.logging && !report.is_empty() {
            tracing::debug!(
                written = report.written,
                deleted = report.deleted,
                failed = report.failed,
                "flush pass"
            );
        }

        (report, first_error)
    }
}

impl<V: Send + Sync + 'static> FlushTarget for Shared<V> {
    fn flush_pending(&self) -> FlushReport {
        self.flush_pass().0
    }
}

/// Keys must be non-empty
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}
