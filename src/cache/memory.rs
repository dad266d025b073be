//! Concurrency-safe in-memory store with per-entry fetch timestamps

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// A cached value together with the time it was stored
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    /// The cached value
    value: V,
    /// When the value was fetched from the registry
    fetched_at: DateTime<Utc>,
}

/// In-memory key-value store stamping every write with the current UTC time
///
/// All reads and writes are serialized through a single async mutex scoped to
/// the cache instance (not per key); entries are small and operations are
/// O(1), so the lock is held only briefly and never across I/O. A `set`
/// always overwrites, never merges. Entries live for the process lifetime.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> MemoryCache<V> {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves the cached value and its fetch timestamp by key
    ///
    /// # Arguments
    /// * `key` - The key to look up
    ///
    /// # Returns
    /// * `Some((value, fetched_at))` if the key is present
    /// * `None` if the key has never been set
    pub async fn get(&self, key: &str) -> Option<(V, DateTime<Utc>)> {
        let entries = self.entries.lock().await;
        entries.get(key).map(|e| (e.value.clone(), e.fetched_at))
    }

    /// Stores a value under the key, stamping it with the current UTC time
    ///
    /// An existing entry for the key is overwritten, so `fetched_at` is
    /// non-decreasing for any given key.
    pub async fn set(&self, key: &str, value: V) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                fetched_at: Utc::now(),
            },
        );
    }
}
