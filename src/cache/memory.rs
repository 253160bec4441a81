//! Memory Cache
//!
//! HashMap-per-namespace cache behind a single RwLock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{CacheError, CacheNamespace, CacheStore};

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
struct Inner {
    namespaces: HashMap<CacheNamespace, HashMap<String, String>>,
    entries: usize,
}

/// In-process cache shared by every collection
///
/// ## Concurrency:
/// - Lookups take the read lock, mutations the write lock
/// - Hit/miss counters are atomics (lock-free)
#[derive(Default)]
pub struct MemoryCache {
    inner: RwLock<Inner>,

    /// Maximum total entries (None = unbounded)
    capacity: Option<usize>,

    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that refuses new keys beyond `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Create a cache from an optional capacity
    pub fn bounded(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Entries held for one namespace
    pub fn namespace_len(&self, ns: &CacheNamespace) -> usize {
        self.inner
            .read()
            .namespaces
            .get(ns)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.read().entries,
        }
    }

    /// Write a value, enforcing capacity only for keys not yet present
    fn put(&self, ns: &CacheNamespace, key: &str, value: &str) -> Result<(), CacheError> {
        let mut inner = self.inner.write();
        let entries = inner.entries;

        if let Some(existing) = inner
            .namespaces
            .get_mut(ns)
            .and_then(|keys| keys.get_mut(key))
        {
            *existing = value.to_string();
            return Ok(());
        }

        if let Some(capacity) = self.capacity {
            if entries >= capacity {
                return Err(CacheError::CapacityExceeded { capacity });
            }
        }

        inner
            .namespaces
            .entry(ns.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
        inner.entries += 1;
        Ok(())
    }
}

impl CacheStore for MemoryCache {
    fn insert(&self, ns: &CacheNamespace, key: &str, value: &str) -> Result<(), CacheError> {
        self.put(ns, key, value)
    }

    fn find(&self, ns: &CacheNamespace, key: &str) -> Result<Option<String>, CacheError> {
        let found = self
            .inner
            .read()
            .namespaces
            .get(ns)
            .and_then(|keys| keys.get(key))
            .cloned();

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);

        Ok(found)
    }

    fn update(&self, ns: &CacheNamespace, key: &str, value: &str) -> Result<(), CacheError> {
        self.put(ns, key, value)
    }

    fn delete(&self, ns: &CacheNamespace, key: &str) -> Result<(), CacheError> {
        let mut inner = self.inner.write();

        let (removed, now_empty) = match inner.namespaces.get_mut(ns) {
            Some(keys) => (keys.remove(key).is_some(), keys.is_empty()),
            None => (false, false),
        };

        if removed {
            inner.entries -= 1;
        }
        if now_empty {
            inner.namespaces.remove(ns);
        }
        Ok(())
    }

    fn purge(&self, ns: &CacheNamespace) -> Result<usize, CacheError> {
        let mut inner = self.inner.write();
        let removed = inner.namespaces.remove(ns).map(|keys| keys.len()).unwrap_or(0);
        inner.entries -= removed;
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.inner.read().entries
    }
}
