//! Serializer strategies
//!
//! Turns a key/value pair into the text stored in an entry file and back.
//! The store never looks inside that text; any format works as long as
//! `decode(encode(k, v))` gives back the same pair.
//!
//! ## Entry Text (default JSON)
//! ```text
//! {"key":"user:42","value":{"name":"ada","visits":3}}
//! ```
//!
//! The key travels inside the file because file names are one-way digests
//! of the key (see `keymap`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// A decoded entry file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<V> {
    pub key: String,
    pub value: V,
}

/// Borrowed form of `Record`, so encoding never clones the value
#[derive(Serialize)]
struct RecordRef<'a, V> {
    key: &'a str,
    value: &'a V,
}

/// Encode/decode strategy plugged into a `Store`
///
/// Implementations must be pure: same input, same output, no side effects.
pub trait Serializer<V>: Send + Sync {
    /// Render a key/value pair as entry text
    fn encode(&self, key: &str, value: &V) -> Result<String>;

    /// Parse entry text back into a record
    fn decode(&self, text: &str) -> Result<Record<V>>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "custom"
    }
}

// =============================================================================
// JSON
// =============================================================================

/// Default serializer backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact single-line JSON
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented JSON, easier to inspect by hand
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl<V> Serializer<V> for JsonSerializer
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, key: &str, value: &V) -> Result<String> {
        let record = RecordRef { key, value };
        let text = if self.pretty {
            serde_json::to_string_pretty(&record)
        } else {
            serde_json::to_string(&record)
        };
        text.map_err(|e| StoreError::Serialization(format!("JSON encode of {:?}: {}", key, e)))
    }

    fn decode(&self, text: &str) -> Result<Record<V>> {
        serde_json::from_str(text)
            .map_err(|e| StoreError::Serialization(format!("JSON decode: {}", e)))
    }

    fn name(&self) -> &str {
        "json"
    }
}

// =============================================================================
// Closures
// =============================================================================

type EncodeFn<V> = dyn Fn(&str, &V) -> Result<String> + Send + Sync;
type DecodeFn<V> = dyn Fn(&str) -> Result<Record<V>> + Send + Sync;

/// Serializer assembled from a pair of closures
///
/// ```
/// use persistkv::serializer::{FnSerializer, Record, Serializer};
///
/// // "key=value" lines for plain strings
/// let s = FnSerializer::new(
///     |key: &str, value: &String| Ok(format!("{}={}", key, value)),
///     |text: &str| {
///         let (key, value) = text.split_once('=').ok_or_else(|| {
///             persistkv::StoreError::Serialization("missing '='".to_string())
///         })?;
///         Ok(Record { key: key.to_string(), value: value.to_string() })
///     },
/// );
/// let text = s.encode("a", &"b".to_string()).unwrap();
/// assert_eq!(s.decode(&text).unwrap().value, "b");
/// ```
pub struct FnSerializer<V> {
    encode: Box<EncodeFn<V>>,
    decode: Box<DecodeFn<V>>,
}

impl<V> FnSerializer<V> {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&str, &V) -> Result<String> + Send + Sync + 'static,
        D: Fn(&str) -> Result<Record<V>> + Send + Sync + 'static,
    {
        Self {
            encode: Box::new(encode),
            decode: Box::new(decode),
        }
    }
}

impl<V> Serializer<V> for FnSerializer<V> {
    fn encode(&self, key: &str, value: &V) -> Result<String> {
        (self.encode)(key, value)
    }

    fn decode(&self, text: &str) -> Result<Record<V>> {
        (self.decode)(text)
    }
}
