//! Collection Module
//!
//! Couples one ordered index with the shared cache under one namespace.
//!
//! ## Consistency model: index is truth, cache is write-through
//!
//! - **Writes** (insert/update/delete) go to the index first. An index failure
//!   aborts the operation before the cache is touched. The cache is then
//!   brought in line; a cache failure does not undo the durable write, it is
//!   returned as a warning in the outcome and logged.
//! - **Reads** consult the cache first and trust a hit without re-checking the
//!   index. A miss falls through to the index, and the index answer is NOT
//!   copied back into the cache.
//! - **Enumeration** reads the index only.
//!
//! The cache can therefore lag behind the index (absent or stale after an
//! external cache write) but is never ahead of it.
//!
//! ## Concurrency
//! - Writers hold the index write lock across the index write AND the cache
//!   write, so each mutation lands as one step
//! - Readers hold the index read lock across the cache probe and the index
//!   fallback, so they never see one side updated without the other
//! - A released collection is closed: every later operation through a
//!   leftover handle fails with `CollectionNotFound`, so a dropped
//!   collection can never write into a namespace a successor now owns

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::{CacheError, CacheNamespace, CacheStore};
use crate::error::{Result, ShelfError};
use crate::index::{KeyValue, OrderedIndex, MIN_ORDER};
use crate::value;

/// Where a lookup was answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    Cache,
    Index,
}

/// What a successful insert/update did to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// The key was new
    Inserted,
    /// An existing key was overwritten in place
    Updated,
}

/// Result of a successful insert or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub kind: WriteKind,

    /// Set when the index write succeeded but the cache write did not
    pub cache_warning: Option<CacheError>,
}

impl WriteOutcome {
    /// Whether the cache may now disagree with the index
    pub fn is_degraded(&self) -> bool {
        self.cache_warning.is_some()
    }
}

/// Result of a successful delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Whether the index held the key
    pub existed: bool,

    /// Set when the cache entry could not be invalidated
    pub cache_warning: Option<CacheError>,
}

/// Summary of a collection for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub order: usize,
    pub entries: usize,
}

#[derive(Clone, Copy)]
enum CacheWrite {
    Insert,
    Update,
}

/// One named keyspace: an ordered index plus its cache namespace
pub struct Collection {
    /// Collection name (unique within its database)
    name: String,

    /// Directory holding the index's durable state
    base_dir: PathBuf,

    /// Cache partition owned by this collection
    namespace: CacheNamespace,

    /// Exclusively owned ordered index
    index: RwLock<Box<dyn OrderedIndex>>,

    /// Shared acceleration cache
    cache: Arc<dyn CacheStore>,

    /// Set by `release`; only flipped while the index write lock is held
    closed: AtomicBool,
}

impl Collection {
    /// Wrap an index and a cache namespace into a collection
    pub fn new(
        name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        namespace: CacheNamespace,
        index: Box<dyn OrderedIndex>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        let order = index.order();
        if order < MIN_ORDER {
            return Err(ShelfError::InvalidOrder(order));
        }

        Ok(Self {
            name: name.into(),
            base_dir: base_dir.into(),
            namespace,
            index: RwLock::new(index),
            cache,
            closed: AtomicBool::new(false),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a key (overwrites an existing value)
    ///
    /// Steps:
    /// 1. Write to the index (failure: `IndexWriteFailed`, cache untouched)
    /// 2. Write to the cache (failure: reported in the outcome)
    pub fn insert(&self, key: &str, value: &str) -> Result<WriteOutcome> {
        let mut index = self.index.write();
        self.ensure_open()?;

        index
            .insert(key, value)
            .map_err(|source| Self::write_failed(key, source))?;

        tracing::debug!(collection = %self.namespace, key, "Inserted key");

        let cache_warning = self.mirror(CacheWrite::Insert, key, value);
        Ok(WriteOutcome {
            kind: WriteKind::Inserted,
            cache_warning,
        })
    }

    /// Insert a raw value after projecting it to text
    ///
    /// Fails with `ValueNotText` before anything is written.
    pub fn insert_bytes(&self, key: &str, value: &[u8]) -> Result<WriteOutcome> {
        let text = value::as_text(value)?;
        self.insert(key, text)
    }

    /// Update a key in place, or insert it if absent (upsert)
    pub fn update(&self, key: &str, value: &str) -> Result<WriteOutcome> {
        let mut index = self.index.write();
        self.ensure_open()?;

        let updated = index
            .update(key, value)
            .map_err(|source| Self::write_failed(key, source))?;

        let kind = if updated {
            tracing::debug!(collection = %self.namespace, key, "Updated key");
            WriteKind::Updated
        } else {
            tracing::debug!(collection = %self.namespace, key, "Key not found for update, inserting");
            index
                .insert(key, value)
                .map_err(|source| Self::write_failed(key, source))?;
            WriteKind::Inserted
        };

        let cache_warning = self.mirror(CacheWrite::Update, key, value);
        Ok(WriteOutcome {
            kind,
            cache_warning,
        })
    }

    /// Update with a raw value after projecting it to text
    pub fn update_bytes(&self, key: &str, value: &[u8]) -> Result<WriteOutcome> {
        let text = value::as_text(value)?;
        self.update(key, text)
    }

    /// Delete a key from the index, then invalidate it in the cache
    ///
    /// The cache entry is dropped whether or not the index held the key.
    pub fn delete(&self, key: &str) -> Result<DeleteOutcome> {
        let mut index = self.index.write();
        self.ensure_open()?;

        let existed = index
            .delete(key)
            .map_err(|source| Self::write_failed(key, source))?;

        if existed {
            tracing::debug!(collection = %self.namespace, key, "Deleted key");
        } else {
            tracing::debug!(collection = %self.namespace, key, "Key not found for deletion");
        }

        let cache_warning = match self.cache.delete(&self.namespace, key) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    collection = %self.namespace,
                    key,
                    error = %e,
                    "Cache invalidation failed; cache may serve a deleted key"
                );
                Some(e)
            }
        };

        Ok(DeleteOutcome {
            existed,
            cache_warning,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a key (cache first, then index)
    pub fn find(&self, key: &str) -> Result<Option<String>> {
        Ok(self.find_with_source(key)?.map(|(value, _)| value))
    }

    /// Look up a key and report which store answered
    ///
    /// A cache hit is returned as-is; an index answer is not written back.
    pub fn find_with_source(&self, key: &str) -> Result<Option<(String, HitSource)>> {
        let index = self.index.read();
        self.ensure_open()?;

        match self.cache.find(&self.namespace, key) {
            Ok(Some(value)) => {
                tracing::debug!(collection = %self.namespace, key, "Found key in cache");
                return Ok(Some((value, HitSource::Cache)));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    collection = %self.namespace,
                    key,
                    error = %e,
                    "Cache lookup failed, falling back to index"
                );
            }
        }

        let found = index.find(key)?;
        match found {
            Some(_) => tracing::debug!(collection = %self.namespace, key, "Found key in index"),
            None => tracing::debug!(collection = %self.namespace, key, "Key not found"),
        }

        Ok(found.map(|value| (value, HitSource::Index)))
    }

    /// Query the index directly, bypassing the cache
    pub fn find_in_index(&self, key: &str) -> Result<Option<String>> {
        let index = self.index.read();
        self.ensure_open()?;
        Ok(index.find(key)?)
    }

    /// Every entry of the index in ascending key order (cache not consulted)
    pub fn find_all(&self) -> Result<Vec<KeyValue>> {
        let index = self.index.read();
        self.ensure_open()?;
        Ok(index.find_all()?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush the index's durable state
    pub fn sync(&self) -> Result<()> {
        let mut index = self.index.write();
        self.ensure_open()?;
        Ok(index.sync()?)
    }

    /// Close the collection: drop its cache entries and flush the index
    ///
    /// Idempotent. Every other operation fails with `CollectionNotFound`
    /// afterwards.
    pub fn release(&self) -> Result<()> {
        let mut index = self.index.write();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        match self.cache.purge(&self.namespace) {
            Ok(removed) => {
                tracing::debug!(collection = %self.namespace, removed, "Purged cache namespace");
            }
            Err(e) => {
                tracing::warn!(collection = %self.namespace, error = %e, "Cache purge failed");
            }
        }
        Ok(index.sync()?)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `release` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Branching factor of the index
    pub fn order(&self) -> usize {
        self.index.read().order()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn namespace(&self) -> &CacheNamespace {
        &self.namespace
    }

    /// Number of keys in the index
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn info(&self) -> CollectionInfo {
        let index = self.index.read();
        CollectionInfo {
            name: self.name.clone(),
            order: index.order(),
            entries: index.len(),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Callers hold the index lock, so `release` cannot slip in between
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ShelfError::CollectionNotFound(self.name.clone()));
        }
        Ok(())
    }

    fn write_failed(key: &str, source: crate::index::IndexError) -> ShelfError {
        ShelfError::IndexWriteFailed {
            key: key.to_string(),
            source,
        }
    }

    /// Mirror an index write into the cache
    ///
    /// On failure the key is invalidated (best effort) so the cache never
    /// keeps a value older than the index, and the error is handed back.
    fn mirror(&self, op: CacheWrite, key: &str, value: &str) -> Option<CacheError> {
        let result = match op {
            CacheWrite::Insert => self.cache.insert(&self.namespace, key, value),
            CacheWrite::Update => self.cache.update(&self.namespace, key, value),
        };

        let error = result.err()?;
        tracing::warn!(
            collection = %self.namespace,
            key,
            error = %error,
            "Cache write failed; index and cache may diverge"
        );

        if let Err(e) = self.cache.delete(&self.namespace, key) {
            tracing::warn!(collection = %self.namespace, key, error = %e, "Cache invalidation failed");
        }

        Some(error)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("base_dir", &self.base_dir)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
