//! Error types for ShelfDB
//!
//! Provides a unified error type for all operations. The ordered index and
//! the acceleration cache keep their own error types ([`IndexError`] and
//! [`CacheError`]); index failures are wrapped here, cache failures are soft
//! and travel inside write outcomes instead.
//!
//! [`CacheError`]: crate::cache::CacheError

use thiserror::Error;

use crate::index::IndexError;

/// Result type alias using ShelfError
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Unified error type for ShelfDB operations
#[derive(Debug, Error)]
pub enum ShelfError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    /// A mutation was rejected by the ordered index; the cache was not touched
    #[error("Index write failed for key '{key}': {source}")]
    IndexWriteFailed {
        key: String,
        #[source]
        source: IndexError,
    },

    /// A read-side index failure (lookup or enumeration)
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Collection / Database Errors
    // -------------------------------------------------------------------------
    #[error("Collection already exists: {0}")]
    DuplicateCollection(String),

    #[error("Invalid order {0}: must be at least 3")]
    InvalidOrder(usize),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Database already exists: {0}")]
    DatabaseAlreadyExists(String),

    /// The directory of `requested` holds a database stored as `stored`
    #[error("Database '{requested}' holds the manifest of database '{stored}'")]
    DatabaseIdMismatch { requested: String, stored: String },

    #[error("Invalid name '{0}': use 1-255 ASCII letters, digits, '-', '_' or '.'")]
    InvalidName(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    // -------------------------------------------------------------------------
    // Value Errors
    // -------------------------------------------------------------------------
    #[error("Value is not valid UTF-8 text")]
    ValueNotText,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShelfError {
    /// Whether the error means "the thing asked for does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ShelfError::KeyNotFound
                | ShelfError::CollectionNotFound(_)
                | ShelfError::DatabaseNotFound(_)
        )
    }
}
