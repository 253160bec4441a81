//! Engine Module
//!
//! Routes protocol commands to databases and collections.
//!
//! ## Responsibilities
//! - Validate configuration and prepare the data directory
//! - Resolve database ids through the [`Registry`]
//! - Project raw command values to text before anything is written
//! - Translate collection outcomes into a [`Reply`]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::cache::CacheError;
use crate::collection::{Collection, CollectionInfo, WriteOutcome};
use crate::config::Config;
use crate::error::{Result, ShelfError};
use crate::index::KeyValue;
use crate::protocol::Command;
use crate::registry::Registry;
use crate::value;

/// Successful result of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The command took effect
    Done,

    /// The write is durable but the cache could not follow
    Degraded(CacheError),

    /// A delete ran; `existed` tells whether the index held the key
    Deleted { existed: bool },

    /// A looked-up value
    Value(String),

    /// Entries of a collection in key order
    Entries(Vec<KeyValue>),

    /// Collections of a database in creation order
    Collections(Vec<CollectionInfo>),

    Pong,
}

impl Reply {
    fn from_write(outcome: WriteOutcome) -> Self {
        match outcome.cache_warning {
            Some(warning) => Reply::Degraded(warning),
            None => Reply::Done,
        }
    }
}

/// The request handler shared by every connection
///
/// ## Concurrency Model
/// The engine holds no locks of its own. The registry serializes database
/// opens, databases serialize collection create/drop, and each collection
/// serializes its writers while letting readers share.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Open databases
    registry: Registry,
}

impl Engine {
    /// Open an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the configuration
    /// 2. Create the data directory if missing
    /// 3. Build a registry over a fresh memory cache
    ///
    /// Databases are loaded lazily on first use.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let registry = Registry::with_memory_cache(config.clone());
        tracing::info!(data_dir = %config.data_dir.display(), "Engine ready");

        Ok(Self { config, registry })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Build an engine around an existing registry
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let config = registry.config().clone();
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config, registry })
    }

    /// Execute a command
    ///
    /// Lookups of absent keys and deletes of absent keys fail with
    /// `KeyNotFound`. Only `CreateDatabase` creates a missing database.
    pub fn execute(&self, command: Command) -> Result<Reply> {
        match command {
            Command::CreateDatabase { db } => {
                self.registry.get(&db, true)?;
                Ok(Reply::Done)
            }
            Command::CreateCollection { db, name, order } => {
                let database = self.registry.get(&db, false)?;
                database.create_collection(&name, order as usize)?;
                Ok(Reply::Done)
            }
            Command::Insert {
                db,
                collection,
                key,
                value,
            } => {
                let text = value::as_text(&value)?;
                let outcome = self.collection(&db, &collection)?.insert(&key, text)?;
                Ok(Reply::from_write(outcome))
            }
            Command::Find {
                db,
                collection,
                key,
            } => match self.collection(&db, &collection)?.find(&key)? {
                Some(value) => Ok(Reply::Value(value)),
                None => Err(ShelfError::KeyNotFound),
            },
            Command::Update {
                db,
                collection,
                key,
                value,
            } => {
                let text = value::as_text(&value)?;
                let outcome = self.collection(&db, &collection)?.update(&key, text)?;
                Ok(Reply::from_write(outcome))
            }
            Command::Delete {
                db,
                collection,
                key,
            } => {
                let outcome = self.collection(&db, &collection)?.delete(&key)?;
                Ok(match outcome.cache_warning {
                    Some(warning) => Reply::Degraded(warning),
                    None => Reply::Deleted {
                        existed: outcome.existed,
                    },
                })
            }
            Command::FindAll { db, collection } => {
                let entries = self.collection(&db, &collection)?.find_all()?;
                Ok(Reply::Entries(entries))
            }
            Command::ListCollections { db } => {
                let database = self.registry.get(&db, false)?;
                Ok(Reply::Collections(database.list_collections()))
            }
            Command::DropCollection { db, name } => {
                let database = self.registry.get(&db, false)?;
                database.drop_collection(&name)?;
                Ok(Reply::Done)
            }
            Command::Ping => Ok(Reply::Pong),
        }
    }

    /// Close every open database
    pub fn shutdown(&self) -> Result<()> {
        tracing::info!(open = self.registry.open_ids().len(), "Shutting down engine");
        self.registry.shutdown()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn collection(&self, db: &str, name: &str) -> Result<Arc<Collection>> {
        self.registry.get(db, false)?.get_collection(name)
    }
}
