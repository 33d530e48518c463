//! # persistkv
//!
//! An embedded key-value persistence layer with:
//! - An in-memory cache that serves every read
//! - One file per key, replaced atomically on write
//! - Write-through or batched (interval) sync to disk
//! - Pluggable serializers (JSON by default)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                                │
//! │        get / set / remove / clear / keys / values            │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!         ┌─────────────┐               ┌──────────────┐
//!         │    Cache    │◄──── dirty ───│   Flusher    │
//!         │  (RwLock)   │               │ (interval)   │
//!         └─────────────┘               └──────┬───────┘
//!                                              │
//!                ┌─────────────────────────────┘
//!                ▼
//!         ┌─────────────┐   map_key    ┌──────────────┐
//!         │ Serializer  │─────────────►│  FileStore   │
//!         │   (JSON)    │              │ (1 file/key) │
//!         └─────────────┘              └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use persistkv::{Config, Store};
//! use serde_json::{json, Value};
//!
//! let store: Store<Value> = Store::open(Config::builder().dir("persist").build())?;
//! store.set_item("answer", json!(42))?;
//! assert_eq!(store.get_item("answer"), Some(json!(42)));
//! store.shutdown()?;
//! # Ok::<(), persistkv::StoreError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod serializer;
pub mod keymap;
pub mod storage;
pub mod cache;
pub mod sync;
pub mod engine;
pub mod opening;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, ConfigBuilder, SyncMode};
pub use engine::Store;
pub use error::{Result, StoreError};
pub use opening::Opening;
pub use serializer::{FnSerializer, JsonSerializer, Record, Serializer};
pub use storage::TextEncoding;
pub use sync::{FlushReport, StatsSnapshot};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of persistkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
