//! Cache Module
//!
//! Volatile text overlay in front of the ordered indexes.
//!
//! ## Responsibilities
//! - Point insert/lookup/update/delete of text values
//! - Partitioning by [`CacheNamespace`] so collections cannot touch each
//!   other's entries
//! - Reporting failures as [`CacheError`], which callers treat as soft
//!
//! Eviction is not implemented: a bounded cache refuses new keys once full.

mod memory;

use std::fmt;

use thiserror::Error;

pub use memory::{CacheStats, MemoryCache};

/// Failures raised by a cache store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache is full ({capacity} entries)")]
    CapacityExceeded { capacity: usize },

    #[error("invalid cache namespace: {0}")]
    InvalidNamespace(String),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Compound key identifying one collection's slice of the cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheNamespace {
    database: String,
    collection: String,
}

impl CacheNamespace {
    /// Build a namespace; both parts must be non-empty
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Result<Self, CacheError> {
        let database = database.into();
        let collection = collection.into();

        if database.is_empty() || collection.is_empty() {
            return Err(CacheError::InvalidNamespace(format!(
                "database '{}' / collection '{}'",
                database, collection
            )));
        }

        Ok(Self {
            database,
            collection,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.collection)
    }
}

/// Contract between a collection and the acceleration cache
pub trait CacheStore: Send + Sync {
    /// Store a value for a key
    fn insert(&self, ns: &CacheNamespace, key: &str, value: &str) -> Result<(), CacheError>;

    /// Look up a key; `Ok(None)` is a miss
    fn find(&self, ns: &CacheNamespace, key: &str) -> Result<Option<String>, CacheError>;

    /// Overwrite a key's value (stores it if absent)
    fn update(&self, ns: &CacheNamespace, key: &str, value: &str) -> Result<(), CacheError>;

    /// Drop a key; absent keys are not an error
    fn delete(&self, ns: &CacheNamespace, key: &str) -> Result<(), CacheError>;

    /// Drop every key of a namespace, returning how many were removed
    fn purge(&self, ns: &CacheNamespace) -> Result<usize, CacheError>;

    /// Total entries across all namespaces
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
