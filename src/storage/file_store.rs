//! File Store
//!
//! Reads and writes individual entry files in the storage directory.
//!
//! ## Responsibilities
//! - Create the directory on startup
//! - Atomic replace of entry files
//! - Discover existing entries on startup
//! - Sweep temp files left behind by a crash mid-write

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::keymap;

use super::TextEncoding;

/// Prefix and suffix of in-flight temp files: `.{name}.tmp`
const TEMP_PREFIX: char = '.';
const TEMP_SUFFIX: &str = ".tmp";

/// Stateless handle on the storage directory
///
/// Holds nothing but the directory path and the byte encoding, so all
/// methods take `&self` and it can be shared freely.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory holding one file per entry
    dir: PathBuf,

    /// Byte encoding of entry contents
    encoding: TextEncoding,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, encoding: TextEncoding) -> Self {
        Self {
            dir: dir.into(),
            encoding,
        }
    }

    /// Create the directory (and parents) if missing
    pub fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::storage(&self.dir, e))
    }

    /// Replace the contents of entry `name` with `text`
    ///
    /// Steps:
    /// 1. Encode text with the configured encoding
    /// 2. Write to `.{name}.tmp` and fsync
    /// 3. Rename over `{name}` (atomic on the same filesystem)
    /// 4. fsync the directory so the rename itself survives a crash
    ///
    /// A crash at any step leaves either the old or the new contents under
    /// `name`, never a partial file.
    pub fn write_entry(&self, name: &str, text: &str) -> Result<()> {
        let bytes = self.encoding.encode(text)?;

        let temp_path = self.temp_path(name);
        let final_path = self.entry_path(name);

        if let Err(e) = Self::write_synced(&temp_path, &bytes) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::storage(temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::storage(final_path, e));
        }

        self.sync_dir()
    }

    /// Read entry `name`
    ///
    /// Returns:
    /// - `Ok(Some(text))`: entry exists
    /// - `Ok(None)`: no such entry
    /// - `Err(CorruptEntry)`: bytes are not valid in the configured encoding
    pub fn read_entry(&self, name: &str) -> Result<Option<String>> {
        let path = self.entry_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::storage(path, e)),
        };

        match self.encoding.decode(&bytes) {
            Ok(text) => Ok(Some(text)),
            Err(e) => Err(StoreError::CorruptEntry {
                file: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Remove entry `name`. Missing files are not an error.
    pub fn delete_entry(&self, name: &str) -> Result<()> {
        let path = self.entry_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::storage(path, e)),
        }
    }

    /// Lazily list entry file names
    ///
    /// Temp files, subdirectories and names not produced by `map_key` are
    /// skipped. The iterator is one-shot; call again for a fresh listing.
    pub fn list_entries(&self) -> Result<EntryNames> {
        let inner = fs::read_dir(&self.dir).map_err(|e| StoreError::storage(&self.dir, e))?;
        Ok(EntryNames {
            dir: self.dir.clone(),
            inner,
        })
    }

    /// Delete temp files left by interrupted writes. Returns how many were removed.
    pub fn remove_stale_temp_files(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir).map_err(|e| StoreError::storage(&self.dir, e))? {
            let entry = entry.map_err(|e| StoreError::storage(&self.dir, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            let is_temp = name
                .strip_prefix(TEMP_PREFIX)
                .and_then(|rest| rest.strip_suffix(TEMP_SUFFIX))
                .map_or(false, keymap::is_entry_file_name);

            if is_temp {
                let path = entry.path();
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(StoreError::storage(path, e)),
                }
            }
        }

        Ok(removed)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the storage directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the byte encoding of entry files
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Full path of entry `name`
    pub fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", TEMP_PREFIX, name, TEMP_SUFFIX))
    }

    fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    /// Persist directory metadata (renames). Not supported on Windows.
    #[cfg(unix)]
    fn sync_dir(&self) -> Result<()> {
        File::open(&self.dir)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| StoreError::storage(&self.dir, e))
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> Result<()> {
        Ok(())
    }
}

/// One-shot iterator over entry file names in the storage directory
pub struct EntryNames {
    dir: PathBuf,
    inner: fs::ReadDir,
}

impl Iterator for EntryNames {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(StoreError::storage(&self.dir, e))),
            };

            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !keymap::is_entry_file_name(&name) {
                continue;
            }

            match entry.file_type() {
                Ok(t) if t.is_file() => return Some(Ok(name)),
                Ok(_) => continue,
                Err(e) => return Some(Err(StoreError::storage(entry.path(), e))),
            }
        }
    }
}
