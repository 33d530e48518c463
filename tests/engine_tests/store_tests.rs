//! Tests for Store
//!
//! These tests verify:
//! - Basic get/set/remove/clear operations
//! - Snapshot enumeration (keys/values/for_each)
//! - Persistence across restarts
//! - Load-time recovery from corrupt and foreign files
//! - Serializer and text encoding plumbing
//! - Error surfacing (serialization, storage, invalid keys)
//! - Background open and concurrent access

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread;

use persistkv::keymap::map_key;
use persistkv::{
    Config, ConfigBuilder, FnSerializer, Record, Store, StoreError, SyncMode, TextEncoding,
};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store<Value>) {
    let temp_dir = TempDir::new().unwrap();
    let store = open_json(temp_dir.path());
    (temp_dir, store)
}

fn open_json(dir: &Path) -> Store<Value> {
    let config = Config::builder().dir(dir).build();
    Store::open(config).unwrap()
}

fn common_object() -> Value {
    json!({"1": 1, "2": "two", "three": {"1": 1}})
}

/// Entry files in `dir`, ignoring hidden temp files
fn entry_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(map_key(key))
}

struct ThreadWaker(thread::Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }
}

/// Minimal executor: poll on the current thread, park between polls
fn block_on<F: Future>(fut: F) -> F::Output {
    let mut fut = std::pin::pin!(fut);
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => thread::park(),
        }
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_store_open_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("nested").join("persist");

    let store = open_json(&dir);

    assert!(dir.is_dir());
    assert_eq!(store.dir(), dir.as_path());
    assert!(store.is_empty());
}

#[test]
fn test_store_get_unset_key() {
    let (_temp, store) = setup_temp_store();

    assert_eq!(store.get_item("no-such-key"), None);
    assert!(!store.contains_key("no-such-key"));
}

#[test]
fn test_store_set_get() {
    let (_temp, store) = setup_temp_store();

    store.set_item("test-get-key-int", json!(42)).unwrap();
    store.set_item("test-get-key-obj", common_object()).unwrap();

    assert_eq!(store.get_item("test-get-key-int"), Some(json!(42)));
    assert_eq!(store.get_item("test-get-key-obj"), Some(common_object()));
}

#[test]
fn test_store_set_returns_value() {
    let (_temp, store) = setup_temp_store();

    let stored = store.set_item("k", json!([1, 2, 3])).unwrap();

    assert_eq!(stored, json!([1, 2, 3]));
}

#[test]
fn test_store_set_overwrite() {
    let (temp, store) = setup_temp_store();

    store.set_item("key", json!("value1")).unwrap();
    store.set_item("key", json!("value2")).unwrap();

    assert_eq!(store.get_item("key"), Some(json!("value2")));
    assert_eq!(store.length(), 1);
    assert_eq!(entry_file_names(temp.path()).len(), 1);
}

#[test]
fn test_store_remove() {
    let (temp, store) = setup_temp_store();

    store.set_item("test-remove-key", json!(42)).unwrap();
    assert!(store.get_item("test-remove-key").is_some());
    assert!(entry_path(temp.path(), "test-remove-key").exists());

    store.remove_item("test-remove-key").unwrap();

    assert_eq!(store.get_item("test-remove-key"), None);
    assert!(!entry_path(temp.path(), "test-remove-key").exists());
}

#[test]
fn test_store_remove_nonexistent_key() {
    let (_temp, store) = setup_temp_store();

    // Should not error
    store.remove_item("nonexistent").unwrap();
    assert_eq!(store.get_item("nonexistent"), None);
}

#[test]
fn test_store_clear() {
    let (temp, store) = setup_temp_store();

    store.set_item("test-clear-key-int", json!(42)).unwrap();
    store.set_item("test-clear-key-obj", common_object()).unwrap();
    assert_eq!(entry_file_names(temp.path()).len(), 2);

    store.clear().unwrap();

    assert_eq!(store.length(), 0);
    assert_eq!(store.get_item("test-clear-key-int"), None);
    assert_eq!(store.get_item("test-clear-key-obj"), None);
    assert!(entry_file_names(temp.path()).is_empty());
}

#[test]
fn test_store_clear_empty() {
    let (_temp, store) = setup_temp_store();

    store.clear().unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_store_empty_key_rejected() {
    let (_temp, store) = setup_temp_store();

    assert!(matches!(
        store.set_item("", json!(1)),
        Err(StoreError::InvalidKey(_))
    ));
    assert!(matches!(store.remove_item(""), Err(StoreError::InvalidKey(_))));
    assert!(store.is_empty());
}

#[test]
fn test_store_unsafe_keys() {
    let (temp, store) = setup_temp_store();
    let long_key = "k".repeat(10_000);
    let keys = ["../escape", "a/b/c", "with space", "ключ", long_key.as_str()];

    for (i, key) in keys.iter().enumerate() {
        store.set_item(key, json!(i)).unwrap();
    }

    assert_eq!(store.length(), keys.len());
    assert_eq!(entry_file_names(temp.path()).len(), keys.len());
    assert!(!temp.path().join("escape").exists());
}

// =============================================================================
// Enumeration Tests
// =============================================================================

#[test]
fn test_store_length_counts_defined_keys() {
    let (_temp, store) = setup_temp_store();

    store.set_item("1", json!(1)).unwrap();
    store.set_item("2", json!("two")).unwrap();
    store.set_item("three", json!({"1": 1})).unwrap();

    assert_eq!(store.length(), 3);

    store.remove_item("2").unwrap();

    let defined = ["1", "2", "three"]
        .iter()
        .filter(|key| store.get_item(key).is_some())
        .count();
    assert_eq!(store.length(), defined);
}

#[test]
fn test_store_values_multiset() {
    let (_temp, store) = setup_temp_store();

    store.set_item("a", json!(42)).unwrap();
    store.set_item("b", common_object()).unwrap();
    store.set_item("c", json!(42)).unwrap();

    let values = store.values();

    assert_eq!(values.len(), 3);
    assert_eq!(values.iter().filter(|v| **v == json!(42)).count(), 2);
    assert!(values.contains(&common_object()));
}

#[test]
fn test_store_keys_snapshot() {
    let (_temp, store) = setup_temp_store();

    store.set_item("x", json!(1)).unwrap();
    store.set_item("y", json!(2)).unwrap();

    let mut keys = store.keys();
    store.set_item("z", json!(3)).unwrap();

    keys.sort();
    assert_eq!(keys, vec!["x".to_string(), "y".to_string()]);

    // Fresh snapshot sees the new key
    assert_eq!(store.keys().len(), 3);
}

#[test]
fn test_store_for_each_visits_snapshot() {
    let (_temp, store) = setup_temp_store();

    store.set_item("a", json!(1)).unwrap();
    store.set_item("b", json!(2)).unwrap();

    let mut seen = HashMap::new();
    store.for_each(|key, value| {
        seen.insert(key.to_string(), value.clone());
        // Mutating from the callback must not deadlock
        store.set_item(&format!("{}-copy", key), value.clone()).unwrap();
    });

    assert_eq!(seen.len(), 2);
    assert_eq!(seen["a"], json!(1));
    assert_eq!(seen["b"], json!(2));
    assert_eq!(store.length(), 4);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_store_restart_after_kill() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = open_json(temp_dir.path());
        store.set_item("a", json!(42)).unwrap();
        // Simulate a kill: no shutdown, no Drop
        std::mem::forget(store);
    }

    let store = open_json(temp_dir.path());
    assert_eq!(store.get_item("a"), Some(json!(42)));
}

#[test]
fn test_store_restart_restores_all_state() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = open_json(temp_dir.path());
        store.set_item("1", json!(1)).unwrap();
        store.set_item("2", json!("two")).unwrap();
        store.set_item("three", json!({"1": 1})).unwrap();
        store.set_item("gone", json!(null)).unwrap();
        store.remove_item("gone").unwrap();
        store.shutdown().unwrap();
    }

    let store = open_json(temp_dir.path());
    assert_eq!(store.length(), 3);
    assert_eq!(store.get_item("1"), Some(json!(1)));
    assert_eq!(store.get_item("2"), Some(json!("two")));
    assert_eq!(store.get_item("three"), Some(json!({"1": 1})));
    assert_eq!(store.get_item("gone"), None);
}

#[test]
fn test_store_file_layout() {
    let (temp, store) = setup_temp_store();

    store.set_item("user:42", json!({"name": "ada"})).unwrap();

    assert_eq!(entry_file_names(temp.path()), vec![map_key("user:42")]);

    let text = fs::read_to_string(entry_path(temp.path(), "user:42")).unwrap();
    let record: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(record, json!({"key": "user:42", "value": {"name": "ada"}}));
}

#[test]
fn test_store_open_path() {
    let temp_dir = TempDir::new().unwrap();

    let store: Store<Value> = Store::open_path(temp_dir.path()).unwrap();
    store.set_item("k", json!(true)).unwrap();

    assert_eq!(store.sync_mode(), SyncMode::Continuous);
    assert!(entry_path(temp_dir.path(), "k").exists());
}

// =============================================================================
// Load Recovery Tests
// =============================================================================

#[test]
fn test_store_skips_corrupt_entry() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = open_json(temp_dir.path());
        store.set_item("good", json!("fine")).unwrap();
    }
    fs::write(entry_path(temp_dir.path(), "bad"), "{this is not json").unwrap();

    let store = open_json(temp_dir.path());

    assert_eq!(store.length(), 1);
    assert_eq!(store.get_item("good"), Some(json!("fine")));
    assert_eq!(store.get_item("bad"), None);
    // Left in place for inspection
    assert!(entry_path(temp_dir.path(), "bad").exists());
}

#[test]
fn test_store_skips_entry_under_wrong_name() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = open_json(temp_dir.path());
        store.set_item("a", json!(1)).unwrap();
    }
    fs::copy(
        entry_path(temp_dir.path(), "a"),
        entry_path(temp_dir.path(), "b"),
    )
    .unwrap();

    let store = open_json(temp_dir.path());

    assert_eq!(store.length(), 1);
    assert_eq!(store.get_item("a"), Some(json!(1)));
    assert_eq!(store.get_item("b"), None);
}

#[test]
fn test_store_ignores_foreign_files() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("README.txt"), "not an entry").unwrap();
    fs::create_dir(temp_dir.path().join("subdir")).unwrap();

    let store = open_json(temp_dir.path());

    assert!(store.is_empty());
    assert!(temp_dir.path().join("README.txt").exists());
}

#[test]
fn test_store_sweeps_stale_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let stale = temp_dir.path().join(format!(".{}.tmp", map_key("half-written")));
    fs::write(&stale, "{\"key\":\"half-wr").unwrap();

    let store = open_json(temp_dir.path());

    assert!(store.is_empty());
    assert!(!stale.exists());
}

#[test]
fn test_store_open_fails_on_file_path() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("occupied");
    fs::write(&file_path, "x").unwrap();

    let config: Config<Value> = Config::builder().dir(&file_path).build();
    let result = Store::open(config);

    assert!(matches!(result, Err(StoreError::Initialization(_))));
}

#[test]
fn test_store_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();

    let config: Config<Value> = Config::builder()
        .dir(temp_dir.path())
        .continuous(false)
        .flush_interval_ms(0)
        .build();

    assert!(matches!(Store::open(config), Err(StoreError::Config(_))));
}

// =============================================================================
// Error Surfacing Tests
// =============================================================================

#[test]
fn test_store_serialization_error_leaves_cache_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::<HashMap<(u8, u8), u8>>::builder()
        .dir(temp_dir.path())
        .build();
    let store = Store::open(config).unwrap();

    store.set_item("grid", HashMap::new()).unwrap();

    let mut bad = HashMap::new();
    bad.insert((1, 2), 3);
    let result = store.set_item("grid", bad);

    assert!(matches!(result, Err(StoreError::Serialization(_))));
    assert_eq!(store.get_item("grid"), Some(HashMap::new()));
    assert_eq!(store.pending_count(), 0);
}

#[test]
fn test_store_storage_error_keeps_memory_and_retries() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("store");
    let store = open_json(&dir);

    // Pull the directory out from under the store
    fs::remove_dir_all(&dir).unwrap();

    let result = store.set_item("k", json!("v"));
    assert!(matches!(result, Err(StoreError::StorageUnavailable { .. })));

    // Memory is not rolled back; the entry waits for the next flush
    assert_eq!(store.get_item("k"), Some(json!("v")));
    assert_eq!(store.pending_count(), 1);
    assert!(store.stats().failures >= 1);

    fs::create_dir_all(&dir).unwrap();
    let report = store.flush().unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(store.pending_count(), 0);
    assert!(entry_path(&dir, "k").exists());
}

// =============================================================================
// Serializer / Encoding Tests
// =============================================================================

fn line_serializer() -> FnSerializer<String> {
    FnSerializer::new(
        |key: &str, value: &String| Ok(format!("{}\n{}", key, value)),
        |text: &str| {
            let (key, value) = text
                .split_once('\n')
                .ok_or_else(|| StoreError::Serialization("missing newline".to_string()))?;
            Ok(Record {
                key: key.to_string(),
                value: value.to_string(),
            })
        },
    )
}

#[test]
fn test_store_custom_serializer() {
    let temp_dir = TempDir::new().unwrap();
    let open = || {
        let config = ConfigBuilder::with_serializer(line_serializer())
            .dir(temp_dir.path())
            .build();
        Store::open(config).unwrap()
    };

    {
        let store = open();
        store.set_item("greeting", "hello".to_string()).unwrap();
        store.shutdown().unwrap();
    }

    let text = fs::read_to_string(entry_path(temp_dir.path(), "greeting")).unwrap();
    assert_eq!(text, "greeting\nhello");

    let store = open();
    assert_eq!(store.get_item("greeting"), Some("hello".to_string()));
}

#[test]
fn test_store_pretty_json() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::<Value>::builder()
        .dir(temp_dir.path())
        .serializer(persistkv::JsonSerializer::pretty())
        .build();
    let store = Store::open(config).unwrap();

    store.set_item("k", json!({"a": 1})).unwrap();

    let text = fs::read_to_string(entry_path(temp_dir.path(), "k")).unwrap();
    assert!(text.contains('\n'));
}

#[test]
fn test_store_latin1_encoding() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::<Value>::builder()
        .dir(temp_dir.path())
        .text_encoding(TextEncoding::Latin1)
        .build();
    let store = Store::open(config).unwrap();

    store.set_item("k", json!("café")).unwrap();
    let bytes = fs::read(entry_path(temp_dir.path(), "k")).unwrap();
    assert!(bytes.contains(&0xE9));

    let result = store.set_item("k", json!("ключ"));
    assert!(matches!(result, Err(StoreError::Serialization(_))));
    assert_eq!(store.get_item("k"), Some(json!("café")));
}

#[test]
fn test_store_utf16_restart() {
    let temp_dir = TempDir::new().unwrap();
    let open = || {
        let config = Config::<Value>::builder()
            .dir(temp_dir.path())
            .text_encoding(TextEncoding::Utf16Le)
            .build();
        Store::open(config).unwrap()
    };

    {
        let store = open();
        store.set_item("k", json!("ключ")).unwrap();
    }

    let store = open();
    assert_eq!(store.get_item("k"), Some(json!("ключ")));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_store_open_in_background_wait() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = open_json(temp_dir.path());
        store.set_item("a", json!(42)).unwrap();
    }

    let config: Config<Value> = Config::builder().dir(temp_dir.path()).build();
    let store = Store::open_in_background(config).wait().unwrap();

    assert_eq!(store.get_item("a"), Some(json!(42)));
}

#[test]
fn test_store_open_in_background_future() {
    let temp_dir = TempDir::new().unwrap();
    let config: Config<Value> = Config::builder().dir(temp_dir.path()).build();

    let store = block_on(Store::open_in_background(config)).unwrap();
    store.set_item("k", json!(1)).unwrap();

    assert_eq!(store.length(), 1);
}

#[test]
fn test_store_open_in_background_reports_failure() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("occupied");
    fs::write(&file_path, "x").unwrap();

    let config: Config<Value> = Config::builder().dir(&file_path).build();
    let result = Store::open_in_background(config).wait();

    assert!(matches!(result, Err(StoreError::Initialization(_))));
}

#[test]
fn test_store_shutdown_report() {
    let (_temp, store) = setup_temp_store();

    store.set_item("a", json!(1)).unwrap();

    // Continuous mode: nothing left to flush
    let report = store.shutdown().unwrap();
    assert!(report.is_empty());
}

#[test]
fn test_store_stats_count_disk_activity() {
    let (_temp, store) = setup_temp_store();

    store.set_item("a", json!(1)).unwrap();
    store.set_item("b", json!(2)).unwrap();
    store.remove_item("a").unwrap();

    let stats = store.stats();
    assert_eq!(stats.entries_written, 2);
    assert_eq!(stats.entries_deleted, 1);
    assert_eq!(stats.failures, 0);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_store_concurrent_writers_and_readers() {
    let (temp, store) = setup_temp_store();
    let store = Arc::new(store);

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    store.set_item(&format!("t{}-k{}", t, i), json!(i)).unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    let _ = store.get_item("t0-k0");
                    let _ = store.values();
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(store.length(), 100);
    assert_eq!(entry_file_names(temp.path()).len(), 100);
    assert_eq!(store.get_item("t3-k24"), Some(json!(24)));
}
