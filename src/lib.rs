//! # ShelfDB
//!
//! A multi-database, multi-collection key-value store with:
//! - A durable B-tree index per collection (logged, replayed on open)
//! - A shared write-through cache partitioned by database and collection
//! - An index-is-truth consistency protocol (cache never ahead of the index)
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │             (acceptor + worker thread pool)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │                  (command router)                            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Registry                                │
//! │               (database id → Database)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Database   │ ───────► │ Collection  │
//!   │ (manifest)  │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                          index first │ then cache
//!                     ┌──────────────┴──────────┐
//!                     ▼                         ▼
//!              ┌─────────────┐          ┌─────────────┐
//!              │ DurableIndex│          │ CacheStore  │
//!              │ B-tree + log│          │ (namespaced)│
//!              └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod value;

pub mod cache;
pub mod collection;
pub mod database;
pub mod engine;
pub mod index;
pub mod network;
pub mod protocol;
pub mod registry;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use cache::{CacheError, CacheNamespace, CacheStore, MemoryCache};
pub use collection::{Collection, CollectionInfo, DeleteOutcome, HitSource, WriteKind, WriteOutcome};
pub use config::{Config, WalSyncStrategy};
pub use database::Database;
pub use engine::{Engine, Reply};
pub use error::{Result, ShelfError};
pub use index::{BTree, DurableIndex, IndexError, KeyValue, OrderedIndex};
pub use registry::Registry;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ShelfDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
