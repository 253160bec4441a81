//! Tests for collaborator failures
//!
//! These tests verify:
//! - An index failure aborts the write before the cache is touched
//! - A cache failure keeps the durable write and is reported as a warning
//! - A failed cache write never leaves an older value behind
//! - Cache lookup failures fall back to the index

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shelfdb::cache::{CacheError, CacheNamespace, CacheStore, MemoryCache};
use shelfdb::collection::{Collection, HitSource};
use shelfdb::index::{BTree, IndexError, IndexResult, KeyValue, OrderedIndex};
use shelfdb::ShelfError;

// =============================================================================
// Test Doubles
// =============================================================================

/// A B-tree whose mutations can be switched to fail
struct FlakyIndex {
    tree: BTree,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyIndex {
    fn check(&self) -> IndexResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk on fire",
            )));
        }
        Ok(())
    }
}

impl OrderedIndex for FlakyIndex {
    fn order(&self) -> usize {
        self.tree.order()
    }

    fn insert(&mut self, key: &str, value: &str) -> IndexResult<()> {
        self.check()?;
        self.tree.insert(key, value)
    }

    fn find(&self, key: &str) -> IndexResult<Option<String>> {
        self.tree.find(key)
    }

    fn update(&mut self, key: &str, value: &str) -> IndexResult<bool> {
        self.check()?;
        self.tree.update(key, value)
    }

    fn delete(&mut self, key: &str) -> IndexResult<bool> {
        self.check()?;
        self.tree.delete(key)
    }

    fn find_all(&self) -> IndexResult<Vec<KeyValue>> {
        self.tree.find_all()
    }

    fn len(&self) -> usize {
        self.tree.len()
    }
}

/// A memory cache with switchable failure modes
#[derive(Default)]
struct FlakyCache {
    inner: MemoryCache,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    fail_finds: AtomicBool,
}

impl FlakyCache {
    fn unavailable() -> CacheError {
        CacheError::Unavailable("connection refused".to_string())
    }
}

impl CacheStore for FlakyCache {
    fn insert(&self, ns: &CacheNamespace, key: &str, value: &str) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.insert(ns, key, value)
    }

    fn find(&self, ns: &CacheNamespace, key: &str) -> Result<Option<String>, CacheError> {
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.find(ns, key)
    }

    fn update(&self, ns: &CacheNamespace, key: &str, value: &str) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.update(ns, key, value)
    }

    fn delete(&self, ns: &CacheNamespace, key: &str) -> Result<(), CacheError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.delete(ns, key)
    }

    fn purge(&self, ns: &CacheNamespace) -> Result<usize, CacheError> {
        self.inner.purge(ns)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn namespace() -> CacheNamespace {
    CacheNamespace::new("app", "users").unwrap()
}

fn with_flaky_index() -> (Collection, Arc<MemoryCache>, Arc<AtomicBool>) {
    let cache = Arc::new(MemoryCache::new());
    let fail = Arc::new(AtomicBool::new(false));
    let index = FlakyIndex {
        tree: BTree::new(3).unwrap(),
        fail_writes: Arc::clone(&fail),
    };
    let collection =
        Collection::new("users", "/unused", namespace(), Box::new(index), cache.clone()).unwrap();
    (collection, cache, fail)
}

fn with_flaky_cache() -> (Collection, Arc<FlakyCache>) {
    let cache = Arc::new(FlakyCache::default());
    let collection = Collection::new(
        "users",
        "/unused",
        namespace(),
        Box::new(BTree::new(3).unwrap()),
        cache.clone(),
    )
    .unwrap();
    (collection, cache)
}

// =============================================================================
// Index Failure Tests
// =============================================================================

#[test]
fn test_index_failure_on_insert_leaves_cache_untouched() {
    let (collection, cache, fail) = with_flaky_index();
    fail.store(true, Ordering::SeqCst);

    let err = collection.insert("k", "v").unwrap_err();

    assert!(matches!(err, ShelfError::IndexWriteFailed { ref key, .. } if key == "k"));
    assert!(cache.is_empty());
    assert_eq!(collection.find("k").unwrap(), None);
}

#[test]
fn test_index_failure_on_update_keeps_old_cache_value() {
    let (collection, cache, fail) = with_flaky_index();
    collection.insert("k", "v1").unwrap();
    fail.store(true, Ordering::SeqCst);

    assert!(matches!(
        collection.update("k", "v2"),
        Err(ShelfError::IndexWriteFailed { .. })
    ));
    assert_eq!(cache.find(&namespace(), "k").unwrap(), Some("v1".to_string()));
    assert_eq!(collection.find_in_index("k").unwrap(), Some("v1".to_string()));
}

#[test]
fn test_index_failure_on_delete_keeps_cache_entry() {
    let (collection, cache, fail) = with_flaky_index();
    collection.insert("k", "v").unwrap();
    fail.store(true, Ordering::SeqCst);

    assert!(collection.delete("k").is_err());
    assert_eq!(cache.find(&namespace(), "k").unwrap(), Some("v".to_string()));
}

// =============================================================================
// Cache Failure Tests
// =============================================================================

#[test]
fn test_cache_failure_on_insert_is_degraded_not_fatal() {
    let (collection, cache) = with_flaky_cache();
    cache.fail_writes.store(true, Ordering::SeqCst);

    let outcome = collection.insert("k", "v").unwrap();

    assert!(outcome.is_degraded());
    assert!(matches!(outcome.cache_warning, Some(CacheError::Unavailable(_))));
    assert_eq!(collection.find_in_index("k").unwrap(), Some("v".to_string()));
    assert_eq!(
        collection.find_with_source("k").unwrap(),
        Some(("v".to_string(), HitSource::Index))
    );
}

#[test]
fn test_cache_failure_on_update_drops_stale_entry() {
    let (collection, cache) = with_flaky_cache();
    collection.insert("k", "v1").unwrap();
    cache.fail_writes.store(true, Ordering::SeqCst);

    let outcome = collection.update("k", "v2").unwrap();

    assert!(outcome.is_degraded());
    // The old value must not be served
    assert_eq!(cache.inner.find(&namespace(), "k").unwrap(), None);
    assert_eq!(collection.find("k").unwrap(), Some("v2".to_string()));
}

#[test]
fn test_cache_failure_on_delete_is_reported() {
    let (collection, cache) = with_flaky_cache();
    collection.insert("k", "v").unwrap();
    cache.fail_deletes.store(true, Ordering::SeqCst);

    let outcome = collection.delete("k").unwrap();

    assert!(outcome.existed);
    assert!(outcome.cache_warning.is_some());
    assert_eq!(collection.find_in_index("k").unwrap(), None);
}

#[test]
fn test_cache_lookup_failure_falls_back_to_index() {
    let (collection, cache) = with_flaky_cache();
    collection.insert("k", "v").unwrap();
    cache.fail_finds.store(true, Ordering::SeqCst);

    assert_eq!(
        collection.find_with_source("k").unwrap(),
        Some(("v".to_string(), HitSource::Index))
    );
    assert_eq!(collection.find("missing").unwrap(), None);
}

#[test]
fn test_full_cache_degrades_new_keys_only() {
    let cache = Arc::new(MemoryCache::with_capacity(1));
    let collection = Collection::new(
        "users",
        "/unused",
        namespace(),
        Box::new(BTree::new(3).unwrap()),
        cache.clone(),
    )
    .unwrap();

    assert!(!collection.insert("a", "1").unwrap().is_degraded());
    let outcome = collection.insert("b", "2").unwrap();
    assert_eq!(
        outcome.cache_warning,
        Some(CacheError::CapacityExceeded { capacity: 1 })
    );
    // Overwrites of cached keys still succeed
    assert!(!collection.update("a", "3").unwrap().is_degraded());

    assert_eq!(collection.find("b").unwrap(), Some("2".to_string()));
    assert_eq!(collection.len(), 2);
}

// =============================================================================
// Construction Failure Tests
// =============================================================================

#[test]
fn test_index_with_low_order_rejected() {
    struct TinyIndex(BTree);

    impl OrderedIndex for TinyIndex {
        fn order(&self) -> usize {
            2
        }
        fn insert(&mut self, key: &str, value: &str) -> IndexResult<()> {
            self.0.insert(key, value)
        }
        fn find(&self, key: &str) -> IndexResult<Option<String>> {
            self.0.find(key)
        }
        fn update(&mut self, key: &str, value: &str) -> IndexResult<bool> {
            self.0.update(key, value)
        }
        fn delete(&mut self, key: &str) -> IndexResult<bool> {
            self.0.delete(key)
        }
        fn find_all(&self) -> IndexResult<Vec<KeyValue>> {
            self.0.find_all()
        }
        fn len(&self) -> usize {
            self.0.len()
        }
    }

    let result = Collection::new(
        "users",
        "/unused",
        namespace(),
        Box::new(TinyIndex(BTree::new(3).unwrap())),
        Arc::new(MemoryCache::new()),
    );
    assert!(matches!(result, Err(ShelfError::InvalidOrder(2))));
}
