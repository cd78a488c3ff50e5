//! Persistent cache store backed by a single JSON file
//!
//! The store maps cache keys to arbitrary JSON payloads. It is loaded once at
//! startup and the whole file is rewritten after every insertion, so the file
//! always mirrors memory after a successful `put`.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when flushing the cache to disk
#[derive(Debug, Error)]
pub enum CacheError {
    /// Directory creation, file writing or renaming failed
    #[error("Failed to write cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store could not be serialized to JSON
    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// In-memory view of the cache file
///
/// Entries are never evicted. A `put` for an existing key overwrites it.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Location of the durable cache file
    path: PathBuf,
    /// Cached payloads keyed by cache key
    entries: HashMap<String, Value>,
}

impl CacheStore {
    /// Creates an empty store that will flush to `path`
    ///
    /// Nothing is read or written until the first `put` or `save`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    /// Loads the store from `path`
    ///
    /// A missing file, unreadable file, invalid JSON, or a JSON document whose
    /// top level is not an object all produce an empty store. This never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No cache file, starting cold");
                return Self::empty(path);
            }
        };

        match serde_json::from_str::<Map<String, Value>>(&content) {
            Ok(map) => {
                debug!(path = %path.display(), entries = map.len(), "Loaded cache");
                Self {
                    path,
                    entries: map.into_iter().collect(),
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache file is corrupt, starting cold");
                Self::empty(path)
            }
        }
    }

    /// Returns the path of the durable cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the payload stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns true if `key` has a stored payload
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `payload` under `key` and rewrites the cache file
    ///
    /// The entry stays in memory even if the flush fails, so memory can be
    /// ahead of disk until the next successful write.
    pub fn put(&mut self, key: impl Into<String>, payload: Value) -> Result<(), CacheError> {
        self.entries.insert(key.into(), payload);
        self.save()
    }

    /// Serializes the entire store to its file
    ///
    /// The JSON is written to a sibling temporary file first and then renamed
    /// over the cache file.
    pub fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let json = serde_json::to_string(&self.entries)?;

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(|source| CacheError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Flushed cache");
        Ok(())
    }

    /// Temporary file used while rewriting the cache
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (CacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = CacheStore::load(temp_dir.path().join("cache.json"));
        (store, temp_dir)
    }

    #[test]
    fn test_load_missing_file_returns_empty_store() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_load_corrupt_file_returns_empty_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache.json");
        fs::write(&path, "{ this is not json").expect("Should write file");

        let store = CacheStore::load(&path);

        assert!(store.is_empty(), "Corrupt cache should load empty");
    }

    #[test]
    fn test_load_non_object_file_returns_empty_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache.json");
        fs::write(&path, "[1, 2, 3]").expect("Should write file");

        let store = CacheStore::load(&path);

        assert!(store.is_empty(), "Array document should load empty");
    }

    #[test]
    fn test_put_writes_file() {
        let (mut store, temp_dir) = create_test_store();

        store
            .put("https://example.com_term_coffee", json!({"businesses": []}))
            .expect("Put should succeed");

        let path = temp_dir.path().join("cache.json");
        assert!(path.exists(), "Cache file should exist after put");
        let content = fs::read_to_string(&path).expect("Should read file");
        assert!(content.contains("https://example.com_term_coffee"));
        assert!(content.contains("businesses"));
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (mut store, temp_dir) = create_test_store();
        let payload = json!({
            "businesses": [{"name": "Comet Coffee", "rating": 4.5}],
            "total": 1
        });

        store.put("api_key", payload.clone()).expect("Put should succeed");
        store
            .put("https://example.com/page", Value::String("<html></html>".to_string()))
            .expect("Put should succeed");

        let reloaded = CacheStore::load(temp_dir.path().join("cache.json"));

        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("api_key"), Some(&payload));
        assert_eq!(
            reloaded.get("https://example.com/page"),
            Some(&Value::String("<html></html>".to_string()))
        );
    }

    #[test]
    fn test_put_overwrites_existing_key() {
        let (mut store, temp_dir) = create_test_store();

        store.put("key", json!("first")).expect("First put should succeed");
        store.put("key", json!("second")).expect("Second put should succeed");

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("key"), Some(&json!("second")));

        let reloaded = CacheStore::load(temp_dir.path().join("cache.json"));
        assert_eq!(reloaded.get("key"), Some(&json!("second")));
    }

    #[test]
    fn test_put_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("dir").join("cache.json");
        let mut store = CacheStore::load(&nested_path);

        store.put("key", json!(1)).expect("Put should succeed");

        assert!(nested_path.exists(), "Nested cache file should be created");
    }

    #[test]
    fn test_put_leaves_no_temporary_file() {
        let (mut store, temp_dir) = create_test_store();

        store.put("key", json!(true)).expect("Put should succeed");

        assert!(!temp_dir.path().join("cache.json.tmp").exists());
    }

    #[test]
    fn test_put_failure_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // A regular file where the parent directory should be
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "x").expect("Should write file");
        let mut store = CacheStore::empty(blocker.join("cache.json"));

        let result = store.put("key", json!(1));

        assert!(matches!(result, Err(CacheError::Io { .. })));
        // Memory keeps the entry even though the flush failed
        assert!(store.contains_key("key"));
    }

    #[test]
    fn test_empty_store_does_not_touch_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache.json");

        let store = CacheStore::empty(&path);

        assert!(store.is_empty());
        assert_eq!(store.path(), path.as_path());
        assert!(!path.exists());
    }
}
