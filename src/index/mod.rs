//! Index Module
//!
//! Ordered key-value indexes backing each collection.
//!
//! ## Responsibilities
//! - Point lookup, insert, update and delete by key
//! - Full enumeration in ascending key order
//! - Durable representation (WAL replay) for persistent collections
//!
//! ## Layout
//! - [`BTree`]: in-memory B-tree parameterized by its order (branching factor)
//! - [`DurableIndex`]: a `BTree` whose mutations are logged to a WAL first
//!
//! The collection layer only talks to the [`OrderedIndex`] trait.

mod btree;
mod durable;

use thiserror::Error;

pub use btree::{BTree, Iter, MIN_ORDER};
pub use durable::DurableIndex;

/// Result type alias for index operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Failures raised by an ordered index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("index serialization error: {0}")]
    Serialization(String),

    #[error("invalid index order {0}: must be at least 3")]
    InvalidOrder(usize),

    #[error("index structure violated: {0}")]
    Structure(String),
}

/// A key/value pair returned by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Contract between a collection and its ordered index
///
/// The collection is the only caller of the mutating methods and serializes
/// them itself, so implementations need no internal locking.
pub trait OrderedIndex: Send + Sync {
    /// Branching factor the index was created with
    fn order(&self) -> usize;

    /// Insert a key, overwriting any previous value
    fn insert(&mut self, key: &str, value: &str) -> IndexResult<()>;

    /// Look up a key
    fn find(&self, key: &str) -> IndexResult<Option<String>>;

    /// Overwrite an existing key; `Ok(false)` if the key is absent
    fn update(&mut self, key: &str, value: &str) -> IndexResult<bool>;

    /// Remove a key; `Ok(false)` if the key was absent
    fn delete(&mut self, key: &str) -> IndexResult<bool>;

    /// Every entry in ascending key order
    fn find_all(&self) -> IndexResult<Vec<KeyValue>>;

    /// Number of live keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push buffered state to durable storage (no-op for volatile indexes)
    fn sync(&mut self) -> IndexResult<()> {
        Ok(())
    }
}
