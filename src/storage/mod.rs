//! Storage Module
//!
//! One file per key in a single flat directory.
//!
//! ## Responsibilities
//! - Create the storage directory on startup
//! - Replace entry files atomically (temp file + fsync + rename)
//! - Enumerate existing entries so the cache can be rebuilt
//! - Idempotent deletes
//!
//! ## Directory Layout
//! ```text
//! {dir}/
//!   ├── 2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae   (entry)
//!   ├── fcde2b2edba56bf408601fb721fe9b5c338d10ee429ea04fae5511b68fbf8fb9   (entry)
//!   └── .fcde2b2e...8fb9.tmp                                           (in-flight write)
//! ```
//!
//! File names come from `keymap::map_key`; contents are serializer text in
//! the configured `TextEncoding`.

mod encoding;
mod file_store;

pub use encoding::TextEncoding;
pub use file_store::{EntryNames, FileStore};
