//! Database Registry
//!
//! Maps external database identifiers to open [`Database`] instances so a
//! database is built at most once per process.
//!
//! The registry is an ordinary owned value: the server constructs one and
//! hands it to the request path. Entries appear on the first successful
//! open of an id and disappear only through [`Registry::unload`] or
//! [`Registry::shutdown`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::cache::{CacheStore, MemoryCache};
use crate::config::Config;
use crate::database::Database;
use crate::error::{Result, ShelfError};
use crate::value::validate_name;

/// Open databases by id
///
/// ## Concurrency:
/// - Hits take the read lock only
/// - Opening an id holds that id's guard while the database loads, so
///   concurrent callers for the same id never build two `Database`
///   instances and a slow load never blocks lookups of other ids
pub struct Registry {
    config: Config,
    cache: Arc<dyn CacheStore>,
    databases: RwLock<HashMap<String, Arc<Database>>>,

    /// Per-id open guards, present only while someone is opening that id
    opening: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Registry {
    /// Create an empty registry over an injected cache
    pub fn new(config: Config, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            cache,
            databases: RwLock::new(HashMap::new()),
            opening: Mutex::new(HashMap::new()),
        }
    }

    /// Create an empty registry with a [`MemoryCache`] sized from `config`
    pub fn with_memory_cache(config: Config) -> Self {
        let cache = Arc::new(MemoryCache::bounded(config.cache_capacity));
        Self::new(config, cache)
    }

    /// Root directory of a database id
    pub fn base_path(&self, id: &str) -> PathBuf {
        self.config.data_dir.join(id)
    }

    /// Return the open database for `id`, loading or creating it as needed
    ///
    /// Order: already open → load from disk → create (only if
    /// `create_if_missing`) → `DatabaseNotFound`. A directory whose manifest
    /// names another database is refused with `DatabaseIdMismatch`, since
    /// its collections would share that database's cache namespaces.
    pub fn get(&self, id: &str, create_if_missing: bool) -> Result<Arc<Database>> {
        validate_name(id)?;

        if let Some(db) = self.lookup(id) {
            return Ok(db);
        }

        let guard = Arc::clone(self.opening.lock().entry(id.to_string()).or_default());
        let result = {
            let _opening = guard.lock();
            match self.lookup(id) {
                Some(db) => Ok(db),
                None => self.open(id, create_if_missing),
            }
        };

        // Waiters still hold clones of the guard; the last one out removes it
        let mut opening = self.opening.lock();
        if Arc::strong_count(&guard) <= 2 {
            opening.remove(id);
        }

        result
    }

    /// Close and forget an open database; false if it was not open
    pub fn unload(&self, id: &str) -> Result<bool> {
        let removed = self.databases.write().remove(id);
        match removed {
            Some(db) => {
                db.close()?;
                tracing::debug!(db = id, "Unloaded database");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close every open database
    ///
    /// Returns the first failure after attempting all databases.
    pub fn shutdown(&self) -> Result<()> {
        let drained: Vec<Arc<Database>> = self.databases.write().drain().map(|(_, db)| db).collect();
        let mut first_error = None;

        for db in drained {
            if let Err(e) = db.close() {
                tracing::warn!(db = db.id(), error = %e, "Failed to close database");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Whether `id` is currently open
    pub fn is_open(&self, id: &str) -> bool {
        self.databases.read().contains_key(id)
    }

    /// Ids of every open database, sorted
    pub fn open_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.databases.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lookup(&self, id: &str) -> Option<Arc<Database>> {
        self.databases.read().get(id).cloned()
    }

    /// Load or create `id` and register it; caller holds the id's guard
    fn open(&self, id: &str, create_if_missing: bool) -> Result<Arc<Database>> {
        let root = self.base_path(id);
        let db = match Database::load(&root, &self.config, Arc::clone(&self.cache)) {
            Ok(db) => db,
            Err(ShelfError::DatabaseNotFound(_)) if create_if_missing => {
                Database::create(&root, id, &self.config, Arc::clone(&self.cache))?
            }
            Err(ShelfError::DatabaseNotFound(_)) => {
                return Err(ShelfError::DatabaseNotFound(id.to_string()));
            }
            Err(e) => return Err(e),
        };

        if db.id() != id {
            tracing::warn!(requested = id, stored = db.id(), "Refusing database stored under another id");
            return Err(ShelfError::DatabaseIdMismatch {
                requested: id.to_string(),
                stored: db.id().to_string(),
            });
        }

        let db = Arc::new(db);
        let mut databases = self.databases.write();
        databases.insert(id.to_string(), Arc::clone(&db));
        tracing::debug!(db = id, open = databases.len(), "Registered database");
        Ok(db)
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
