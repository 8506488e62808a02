//! Sync decision cache
//!
//! Persists, per book identity, what the user decided to do about syncing
//! its notes: ignore it forever, postpone the decision, or bind it to a
//! reference-service key. The backing store is a single JSON object whose
//! keys are `"title | author"` strings and whose values are `-1` (ignored),
//! `0` (postponed), or a string (the bound key). An absent key means the
//! identity has never been decided on.
//!
//! Mutations are read-modify-write against the file: load the whole
//! mapping, change one key, write the whole mapping back atomically. There
//! is no concurrent-writer protection; usage is single-process and
//! human-paced. A multi-process deployment would need file locking.

use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::storage::atomic_write;

/// Identity of a book for synchronization purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncKey {
    pub title: String,
    pub author: String,
}

impl SyncKey {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }

    /// Parse a persisted `"title | author"` key
    pub fn parse(s: &str) -> Self {
        match s.split_once('|') {
            Some((title, author)) => Self::new(title.trim(), author.trim()),
            None => Self::new(s.trim(), ""),
        }
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.title, self.author)
    }
}

/// What the user decided to do with a book's notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Postponed; ask again next run
    Deferred,
    /// Never sync this book; never ask again
    Ignored,
    /// Bound to a reference-service item key; notes are pushed on every run
    Bound(String),
}

impl Disposition {
    /// The persisted JSON form: `0`, `-1`, or the bound key string
    fn to_value(&self) -> Value {
        match self {
            Disposition::Deferred => Value::from(0),
            Disposition::Ignored => Value::from(-1),
            Disposition::Bound(key) => Value::from(key.clone()),
        }
    }

    /// Decode the persisted form; `None` for shapes this version
    /// doesn't know (they are preserved on disk but treated as undecided)
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Disposition::Deferred),
                Some(-1) => Some(Disposition::Ignored),
                _ => None,
            },
            Value::String(key) => Some(Disposition::Bound(key.clone())),
            _ => None,
        }
    }
}

/// Errors from cache persistence
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing store exists but is not a JSON object
    #[error("sync cache at {path:?} is not a valid JSON object: {details}")]
    Corrupt { path: PathBuf, details: String },

    /// Failed to read the backing store
    #[error("failed to read sync cache {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the backing store
    #[error("failed to write sync cache {path:?}: {reason}")]
    Write { path: PathBuf, reason: anyhow::Error },
}

/// Counts of cache entries per state, for status reporting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub deferred: usize,
    pub ignored: usize,
    pub bound: usize,
}

/// Handle to the sync decision cache
///
/// With a path, every mutation is persisted immediately; without one the
/// cache lives in memory only (used by tests and dry runs).
#[derive(Debug, Default)]
pub struct SyncCache {
    entries: Map<String, Value>,
    path: Option<PathBuf>,
}

impl SyncCache {
    /// Create an in-memory cache that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Create a cache backed by a file
    ///
    /// The file is not read until [`validate`](Self::validate) or
    /// [`reload`](Self::reload) is called.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            entries: Map::new(),
            path: Some(path),
        }
    }

    /// Ensure the backing store exists and is parseable, loading it into
    /// memory if so
    ///
    /// Auto-creates an empty store if the file is missing. Returns `false`
    /// if the store was missing or is corrupt; in both cases the in-memory
    /// cache starts empty and the caller decides whether to proceed.
    pub fn validate(&mut self) -> bool {
        let Some(path) = self.path.clone() else {
            return true;
        };

        if !path.exists() {
            warn!(path = %path.display(), "sync cache does not exist, creating an empty one");
            if let Err(e) = atomic_write(&path, b"{}") {
                warn!(path = %path.display(), error = %e, "could not create sync cache");
            }
            return false;
        }

        match self.reload() {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "sync cache is unreadable");
                false
            }
        }
    }

    /// Re-read the backing store from disk
    pub fn reload(&mut self) -> Result<(), CacheError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        self.entries = read_entries(path)?;
        Ok(())
    }

    /// Look up the decision for an identity
    ///
    /// `None` means the identity has never been decided on.
    pub fn get(&self, key: &SyncKey) -> Option<Disposition> {
        self.entries
            .get(&key.to_string())
            .and_then(Disposition::from_value)
    }

    /// Record a decision for an identity, persisting immediately
    ///
    /// Read-modify-write: the on-disk mapping is re-read so entries written
    /// since our load are not lost, then the one key is changed and the
    /// whole mapping written back.
    pub fn set(&mut self, key: &SyncKey, value: Disposition) -> Result<(), CacheError> {
        if let Some(path) = self.path.clone() {
            let mut disk = if path.exists() {
                read_entries(&path)?
            } else {
                Map::new()
            };
            disk.insert(key.to_string(), value.to_value());

            let body = serde_json::to_string_pretty(&Value::Object(disk.clone())).map_err(|e| {
                CacheError::Write {
                    path: path.clone(),
                    reason: e.into(),
                }
            })?;
            atomic_write(&path, body.as_bytes()).map_err(|reason| CacheError::Write {
                path: path.clone(),
                reason,
            })?;

            self.entries = disk;
        } else {
            self.entries.insert(key.to_string(), value.to_value());
        }

        Ok(())
    }

    /// Count entries per state
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for value in self.entries.values() {
            match Disposition::from_value(value) {
                Some(Disposition::Deferred) => stats.deferred += 1,
                Some(Disposition::Ignored) => stats.ignored += 1,
                Some(Disposition::Bound(_)) => stats.bound += 1,
                None => {}
            }
        }
        stats
    }

    /// Number of entries in the cache
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read and decode the on-disk mapping
fn read_entries(path: &PathBuf) -> Result<Map<String, Value>, CacheError> {
    let content = std::fs::read_to_string(path).map_err(|source| CacheError::Read {
        path: path.clone(),
        source,
    })?;

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CacheError::Corrupt {
            path: path.clone(),
            details: format!("expected an object, found {}", json_kind(&other)),
        }),
        Err(e) => Err(CacheError::Corrupt {
            path: path.clone(),
            details: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> SyncKey {
        SyncKey::new("Book Title", "Author Name")
    }

    #[test]
    fn test_key_round_trip() {
        let k = key();
        assert_eq!(k.to_string(), "Book Title | Author Name");
        assert_eq!(SyncKey::parse(&k.to_string()), k);
    }

    #[test]
    fn test_key_parse_without_author() {
        let k = SyncKey::parse("Only A Title");
        assert_eq!(k.title, "Only A Title");
        assert_eq!(k.author, "");
    }

    #[test]
    fn test_in_memory_get_set() {
        let mut cache = SyncCache::in_memory();
        assert_eq!(cache.get(&key()), None);

        cache.set(&key(), Disposition::Ignored).unwrap();
        assert_eq!(cache.get(&key()), Some(Disposition::Ignored));

        cache.set(&key(), Disposition::Bound("ABCD1234".into())).unwrap();
        assert_eq!(
            cache.get(&key()),
            Some(Disposition::Bound("ABCD1234".into()))
        );
    }

    #[test]
    fn test_set_persists_across_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync_cache.json");

        {
            let mut cache = SyncCache::with_path(path.clone());
            cache.validate();
            cache.set(&key(), Disposition::Deferred).unwrap();
        }

        // simulated process restart
        let mut cache = SyncCache::with_path(path);
        assert!(cache.validate());
        assert_eq!(cache.get(&key()), Some(Disposition::Deferred));
    }

    #[test]
    fn test_persisted_shape() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync_cache.json");

        let mut cache = SyncCache::with_path(path.clone());
        cache.set(&key(), Disposition::Ignored).unwrap();
        cache
            .set(&SyncKey::new("Other", "Person"), Disposition::Bound("K123".into()))
            .unwrap();
        cache
            .set(&SyncKey::new("Third", "Writer"), Disposition::Deferred)
            .unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Book Title | Author Name"], Value::from(-1));
        assert_eq!(raw["Other | Person"], Value::from("K123"));
        assert_eq!(raw["Third | Writer"], Value::from(0));
    }

    #[test]
    fn test_validate_creates_missing_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync_cache.json");

        let mut cache = SyncCache::with_path(path.clone());
        assert!(!cache.validate());
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");

        // second run: the store exists and parses
        let mut cache = SyncCache::with_path(path);
        assert!(cache.validate());
    }

    #[test]
    fn test_validate_corrupt_store_is_nonfatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync_cache.json");
        std::fs::write(&path, "not json at all").unwrap();

        let mut cache = SyncCache::with_path(path.clone());
        assert!(!cache.validate());
        assert!(cache.is_empty());

        // the corrupt file was not clobbered; recovery is the caller's call
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json at all");
    }

    #[test]
    fn test_unknown_value_shapes_preserved_on_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync_cache.json");
        std::fs::write(&path, r#"{"Strange | Entry": [1, 2]}"#).unwrap();

        let mut cache = SyncCache::with_path(path.clone());
        assert!(cache.validate());
        assert_eq!(cache.get(&SyncKey::new("Strange", "Entry")), None);

        cache.set(&key(), Disposition::Ignored).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Strange | Entry"], serde_json::json!([1, 2]));
        assert_eq!(raw["Book Title | Author Name"], Value::from(-1));
    }

    #[test]
    fn test_stats() {
        let mut cache = SyncCache::in_memory();
        cache.set(&SyncKey::new("A", "x"), Disposition::Deferred).unwrap();
        cache.set(&SyncKey::new("B", "y"), Disposition::Ignored).unwrap();
        cache.set(&SyncKey::new("C", "z"), Disposition::Bound("K".into())).unwrap();
        cache.set(&SyncKey::new("D", "w"), Disposition::Ignored).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.deferred, 1);
        assert_eq!(stats.ignored, 2);
        assert_eq!(stats.bound, 1);
    }
}
