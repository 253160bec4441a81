//! Tests for the in-memory cache
//!
//! These tests verify:
//! - Namespace construction and isolation
//! - Point operations and hit/miss accounting
//! - Capacity enforcement (overwrites always allowed)
//! - Purging a namespace

use std::sync::Arc;
use std::thread;

use shelfdb::cache::{CacheError, CacheNamespace, CacheStore, MemoryCache};

// =============================================================================
// Helper Functions
// =============================================================================

fn ns(db: &str, coll: &str) -> CacheNamespace {
    CacheNamespace::new(db, coll).unwrap()
}

// =============================================================================
// Namespace Tests
// =============================================================================

#[test]
fn test_namespace_requires_both_parts() {
    assert!(matches!(
        CacheNamespace::new("", "users"),
        Err(CacheError::InvalidNamespace(_))
    ));
    assert!(matches!(
        CacheNamespace::new("app", ""),
        Err(CacheError::InvalidNamespace(_))
    ));

    let namespace = ns("app", "users");
    assert_eq!(namespace.database(), "app");
    assert_eq!(namespace.collection(), "users");
    assert_eq!(namespace.to_string(), "app/users");
}

#[test]
fn test_namespace_is_compound_not_concatenated() {
    // "a_b" + "c" and "a" + "b_c" must never collide
    let cache = MemoryCache::new();
    cache.insert(&ns("a_b", "c"), "k", "first").unwrap();
    cache.insert(&ns("a", "b_c"), "k", "second").unwrap();

    assert_eq!(cache.find(&ns("a_b", "c"), "k").unwrap(), Some("first".to_string()));
    assert_eq!(cache.find(&ns("a", "b_c"), "k").unwrap(), Some("second".to_string()));
}

#[test]
fn test_namespaces_are_isolated() {
    let cache = MemoryCache::new();
    let users = ns("app", "users");
    let orders = ns("app", "orders");

    cache.insert(&users, "id", "alice").unwrap();

    assert_eq!(cache.find(&orders, "id").unwrap(), None);
    cache.delete(&orders, "id").unwrap();
    assert_eq!(cache.find(&users, "id").unwrap(), Some("alice".to_string()));
}

// =============================================================================
// Point Operation Tests
// =============================================================================

#[test]
fn test_insert_find_update_delete() {
    let cache = MemoryCache::new();
    let users = ns("app", "users");

    cache.insert(&users, "k", "v1").unwrap();
    assert_eq!(cache.find(&users, "k").unwrap(), Some("v1".to_string()));

    cache.update(&users, "k", "v2").unwrap();
    assert_eq!(cache.find(&users, "k").unwrap(), Some("v2".to_string()));
    assert_eq!(cache.len(), 1);

    cache.delete(&users, "k").unwrap();
    assert_eq!(cache.find(&users, "k").unwrap(), None);
    assert!(cache.is_empty());
}

#[test]
fn test_update_absent_key_stores_it() {
    let cache = MemoryCache::new();
    let users = ns("app", "users");

    cache.update(&users, "new", "v").unwrap();
    assert_eq!(cache.find(&users, "new").unwrap(), Some("v".to_string()));
}

#[test]
fn test_delete_absent_key_is_ok() {
    let cache = MemoryCache::new();
    cache.delete(&ns("app", "users"), "nothing").unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_stats_count_hits_and_misses() {
    let cache = MemoryCache::new();
    let users = ns("app", "users");
    cache.insert(&users, "k", "v").unwrap();

    cache.find(&users, "k").unwrap();
    cache.find(&users, "k").unwrap();
    cache.find(&users, "missing").unwrap();

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_capacity_rejects_new_keys() {
    let cache = MemoryCache::with_capacity(2);
    let users = ns("app", "users");

    cache.insert(&users, "a", "1").unwrap();
    cache.insert(&users, "b", "2").unwrap();

    assert_eq!(
        cache.insert(&users, "c", "3"),
        Err(CacheError::CapacityExceeded { capacity: 2 })
    );
    assert_eq!(cache.find(&users, "c").unwrap(), None);
    assert_eq!(cache.capacity(), Some(2));
}

#[test]
fn test_capacity_allows_overwrites() {
    let cache = MemoryCache::with_capacity(1);
    let users = ns("app", "users");

    cache.insert(&users, "a", "1").unwrap();
    cache.update(&users, "a", "2").unwrap();
    cache.insert(&users, "a", "3").unwrap();

    assert_eq!(cache.find(&users, "a").unwrap(), Some("3".to_string()));
}

#[test]
fn test_capacity_is_shared_across_namespaces() {
    let cache = MemoryCache::with_capacity(1);
    cache.insert(&ns("app", "users"), "a", "1").unwrap();

    assert!(cache.insert(&ns("app", "orders"), "a", "1").is_err());

    cache.delete(&ns("app", "users"), "a").unwrap();
    cache.insert(&ns("app", "orders"), "a", "1").unwrap();
}

#[test]
fn test_bounded_none_is_unbounded() {
    let cache = MemoryCache::bounded(None);
    let users = ns("app", "users");
    for i in 0..1000 {
        cache.insert(&users, &i.to_string(), "v").unwrap();
    }
    assert_eq!(cache.len(), 1000);
    assert_eq!(cache.capacity(), None);
}

// =============================================================================
// Purge Tests
// =============================================================================

#[test]
fn test_purge_removes_only_one_namespace() {
    let cache = MemoryCache::new();
    let users = ns("app", "users");
    let orders = ns("app", "orders");
    for i in 0..5 {
        cache.insert(&users, &i.to_string(), "u").unwrap();
        cache.insert(&orders, &i.to_string(), "o").unwrap();
    }

    assert_eq!(cache.purge(&users).unwrap(), 5);
    assert_eq!(cache.namespace_len(&users), 0);
    assert_eq!(cache.namespace_len(&orders), 5);
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.purge(&users).unwrap(), 0);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers() {
    let cache = Arc::new(MemoryCache::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let namespace = ns("app", &format!("c{}", t));
                for i in 0..200 {
                    cache.insert(&namespace, &i.to_string(), "v").unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.len(), 1600);
}
