//! Configuration for persistkv
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::serializer::{JsonSerializer, Serializer};
use crate::storage::TextEncoding;

/// Default storage directory, relative to the working directory
pub const DEFAULT_DIR: &str = "persist";

/// Flush period used when write-through is off and no interval was given
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

/// Main configuration for a Store
///
/// Fixed once the store is opened.
pub struct Config<V> {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding one file per key
    pub dir: PathBuf,

    /// Entry text format
    pub serializer: Arc<dyn Serializer<V>>,

    /// Byte encoding of entry files
    pub text_encoding: TextEncoding,

    // -------------------------------------------------------------------------
    // Sync Configuration
    // -------------------------------------------------------------------------
    /// Write every mutation through to disk before returning
    pub continuous: bool,

    /// Flush period for batched mode. Ignored when `continuous` is set.
    pub flush_interval: Option<Duration>,

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------
    /// Emit per-operation tracing events
    pub logging: bool,
}

/// How mutations reach the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every set/remove is written before the call returns (safest, slowest)
    Continuous,

    /// Mutations are batched and written by a background flusher
    Interval { period: Duration },
}

impl<V> Default for Config<V>
where
    V: Serialize + DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self::with_serializer(JsonSerializer::new())
    }
}

impl<V> Clone for Config<V> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            serializer: Arc::clone(&self.serializer),
            text_encoding: self.text_encoding,
            continuous: self.continuous,
            flush_interval: self.flush_interval,
            logging: self.logging,
        }
    }
}

impl<V> fmt::Debug for Config<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("dir", &self.dir)
            .field("serializer", &self.serializer.name())
            .field("text_encoding", &self.text_encoding)
            .field("continuous", &self.continuous)
            .field("flush_interval", &self.flush_interval)
            .field("logging", &self.logging)
            .finish()
    }
}

impl<V> Config<V>
where
    V: Serialize + DeserializeOwned + 'static,
{
    /// Create a new config builder with the JSON serializer
    pub fn builder() -> ConfigBuilder<V> {
        ConfigBuilder::default()
    }
}

impl<V> Config<V> {
    /// Defaults with a custom serializer
    pub fn with_serializer(serializer: impl Serializer<V> + 'static) -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_DIR),
            serializer: Arc::new(serializer),
            text_encoding: TextEncoding::Utf8,
            continuous: true,
            flush_interval: None,
            logging: false,
        }
    }

    /// Resolve `continuous` / `flush_interval` into a single mode
    pub fn sync_mode(&self) -> SyncMode {
        if self.continuous {
            SyncMode::Continuous
        } else {
            SyncMode::Interval {
                period: self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            }
        }
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(StoreError::Config("storage directory is empty".to_string()));
        }
        if self.flush_interval == Some(Duration::ZERO) {
            return Err(StoreError::Config("flush interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
pub struct ConfigBuilder<V> {
    config: Config<V>,
}

impl<V> Default for ConfigBuilder<V>
where
    V: Serialize + DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self {
            config: Config::default(),
        }
    }
}

impl<V> ConfigBuilder<V> {
    /// Start from defaults with a custom serializer
    pub fn with_serializer(serializer: impl Serializer<V> + 'static) -> Self {
        Self {
            config: Config::with_serializer(serializer),
        }
    }

    /// Set the storage directory
    pub fn dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dir = path.into();
        self
    }

    /// Replace the serializer
    pub fn serializer(mut self, serializer: impl Serializer<V> + 'static) -> Self {
        self.config.serializer = Arc::new(serializer);
        self
    }

    /// Set the byte encoding of entry files
    pub fn text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.text_encoding = encoding;
        self
    }

    /// Enable or disable write-through
    pub fn continuous(mut self, continuous: bool) -> Self {
        self.config.continuous = continuous;
        self
    }

    /// Set the batched flush period
    pub fn flush_interval(mut self, period: Duration) -> Self {
        self.config.flush_interval = Some(period);
        self
    }

    /// Set the batched flush period (in milliseconds)
    pub fn flush_interval_ms(self, ms: u64) -> Self {
        self.flush_interval(Duration::from_millis(ms))
    }

    /// Enable or disable per-operation logging
    pub fn logging(mut self, enabled: bool) -> Self {
        self.config.logging = enabled;
        self
    }

    pub fn build(self) -> Config<V> {
        self.config
    }
}
