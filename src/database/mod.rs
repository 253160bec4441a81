//! Database Module
//!
//! A set of uniquely named collections under one root directory.
//!
//! ## Responsibilities
//! - Create new collections (name uniqueness, order validation)
//! - Persist the collection list in a manifest
//! - Rebuild every collection's index when the database is loaded
//! - Release collections on drop/close
//!
//! ## On-disk layout
//! ```text
//! {root}/
//!   ├── manifest
//!   └── {collection}/
//!         └── index.log
//! ```

mod manifest;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::{CacheNamespace, CacheStore};
use crate::collection::{Collection, CollectionInfo};
use crate::config::Config;
use crate::error::{Result, ShelfError};
use crate::index::{DurableIndex, MIN_ORDER};
use crate::value::validate_name;

pub use manifest::{CollectionMeta, Manifest};

/// Mutable database state, guarded by one lock
struct State {
    /// Authoritative collection list (creation order)
    manifest: Manifest,

    /// Open collections by name
    collections: HashMap<String, Arc<Collection>>,
}

/// A named group of collections
///
/// ## Concurrency:
/// - `state`: RwLock (lookups share, create/drop exclusive)
/// - Collections are handed out as `Arc` and lock themselves
pub struct Database {
    /// External identifier
    id: String,

    /// Root directory
    root: PathBuf,

    /// Index settings and paths
    config: Config,

    /// Shared acceleration cache
    cache: Arc<dyn CacheStore>,

    state: RwLock<State>,
}

impl Database {
    const MANIFEST_FILENAME: &'static str = "manifest";

    /// Create a fresh database at `root`
    ///
    /// Fails with `DatabaseAlreadyExists` if `root` already holds one.
    pub fn create(
        root: &Path,
        id: &str,
        config: &Config,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        validate_name(id)?;

        let manifest_path = root.join(Self::MANIFEST_FILENAME);
        if manifest_path.exists() {
            return Err(ShelfError::DatabaseAlreadyExists(id.to_string()));
        }

        fs::create_dir_all(root)?;
        let manifest = Manifest::new(id);
        manifest.save(&manifest_path)?;

        tracing::info!(db = id, root = %root.display(), "Created database");

        Ok(Self {
            id: id.to_string(),
            root: root.to_path_buf(),
            config: config.clone(),
            cache,
            state: RwLock::new(State {
                manifest,
                collections: HashMap::new(),
            }),
        })
    }

    /// Load an existing database from `root`
    ///
    /// Every collection listed in the manifest has its index rebuilt from
    /// its log. Fails with `DatabaseNotFound` if `root` holds no database.
    pub fn load(root: &Path, config: &Config, cache: Arc<dyn CacheStore>) -> Result<Self> {
        let manifest_path = root.join(Self::MANIFEST_FILENAME);
        if !manifest_path.is_file() {
            return Err(ShelfError::DatabaseNotFound(root.display().to_string()));
        }

        let manifest = Manifest::load(&manifest_path)?;
        validate_name(&manifest.id)?;

        let mut collections = HashMap::with_capacity(manifest.collections.len());
        for meta in &manifest.collections {
            let dir = root.join(&meta.name);
            let index = DurableIndex::open(
                &dir,
                meta.order,
                config.wal_sync_strategy,
                config.compaction_threshold,
            )?;
            let namespace = Self::namespace(&manifest.id, &meta.name)?;
            let collection = Collection::new(&meta.name, dir, namespace, Box::new(index), Arc::clone(&cache))?;
            collections.insert(meta.name.clone(), Arc::new(collection));
        }

        tracing::info!(
            db = %manifest.id,
            root = %root.display(),
            collections = collections.len(),
            "Loaded database"
        );

        Ok(Self {
            id: manifest.id.clone(),
            root: root.to_path_buf(),
            config: config.clone(),
            cache,
            state: RwLock::new(State {
                manifest,
                collections,
            }),
        })
    }

    /// Whether `root` holds a database
    pub fn exists(root: &Path) -> bool {
        root.join(Self::MANIFEST_FILENAME).is_file()
    }

    // =========================================================================
    // Collection Lifecycle
    // =========================================================================

    /// Create a collection with an empty index of the given order
    ///
    /// Fails with `DuplicateCollection` or `InvalidOrder` without touching
    /// any state. If the manifest cannot be written the new directory is
    /// removed and the collection is not registered.
    pub fn create_collection(&self, name: &str, order: usize) -> Result<Arc<Collection>> {
        validate_name(name)?;
        if Self::is_reserved(name) {
            return Err(ShelfError::InvalidName(name.to_string()));
        }

        let mut state = self.state.write();
        if state.collections.contains_key(name) {
            return Err(ShelfError::DuplicateCollection(name.to_string()));
        }
        if order < MIN_ORDER {
            return Err(ShelfError::InvalidOrder(order));
        }

        let dir = self.root.join(name);
        let namespace = Self::namespace(&self.id, name)?;

        // A same-named collection may have left entries behind
        if let Err(e) = self.cache.purge(&namespace) {
            tracing::warn!(collection = %namespace, error = %e, "Cache purge failed");
        }

        let index = DurableIndex::create(
            &dir,
            order,
            self.config.wal_sync_strategy,
            self.config.compaction_threshold,
        )?;
        let collection = Arc::new(Collection::new(
            name,
            dir.clone(),
            namespace,
            Box::new(index),
            Arc::clone(&self.cache),
        )?);

        let manifest = state.manifest.with_collection(name, order);
        if let Err(e) = manifest.save(&self.manifest_path()) {
            drop(collection);
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                tracing::warn!(dir = %dir.display(), error = %cleanup, "Failed to remove collection directory");
            }
            return Err(e);
        }

        state.manifest = manifest;
        state.collections.insert(name.to_string(), Arc::clone(&collection));

        tracing::info!(db = %self.id, collection = name, order, "Created collection");
        Ok(collection)
    }

    /// Look up a collection by name
    pub fn get_collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.state
            .read()
            .collections
            .get(name)
            .cloned()
            .ok_or_else(|| ShelfError::CollectionNotFound(name.to_string()))
    }

    /// Remove a collection, its cache entries and its directory
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.collections.contains_key(name) {
            return Err(ShelfError::CollectionNotFound(name.to_string()));
        }

        let manifest = state.manifest.without_collection(name);
        manifest.save(&self.manifest_path())?;
        state.manifest = manifest;

        if let Some(collection) = state.collections.remove(name) {
            if let Err(e) = collection.release() {
                tracing::warn!(collection = name, error = %e, "Failed to release collection");
            }
            if let Err(e) = fs::remove_dir_all(collection.base_dir()) {
                tracing::warn!(
                    dir = %collection.base_dir().display(),
                    error = %e,
                    "Failed to remove collection directory"
                );
            }
        }

        tracing::info!(db = %self.id, collection = name, "Dropped collection");
        Ok(())
    }

    /// Summaries of every collection in creation order
    pub fn list_collections(&self) -> Vec<CollectionInfo> {
        let state = self.state.read();
        state
            .manifest
            .collections
            .iter()
            .filter_map(|meta| state.collections.get(&meta.name))
            .map(|collection| collection.info())
            .collect()
    }

    /// Collection names in creation order
    pub fn collection_names(&self) -> Vec<String> {
        self.state
            .read()
            .manifest
            .collections
            .iter()
            .map(|meta| meta.name.clone())
            .collect()
    }

    /// Release every collection (cache purged, indexes synced)
    ///
    /// Returns the first failure after attempting all collections.
    pub fn close(&self) -> Result<()> {
        let state = self.state.read();
        let mut first_error = None;

        for meta in &state.manifest.collections {
            if let Some(collection) = state.collections.get(&meta.name) {
                if let Err(e) = collection.release() {
                    tracing::warn!(db = %self.id, collection = %meta.name, error = %e, "Failed to release collection");
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::info!(db = %self.id, "Closed database");
        first_error.map_or(Ok(()), Err)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of collections
    pub fn len(&self) -> usize {
        self.state.read().collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Names taken by the database's own files
    fn is_reserved(name: &str) -> bool {
        name == Self::MANIFEST_FILENAME || name == "manifest.tmp"
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(Self::MANIFEST_FILENAME)
    }

    fn namespace(db: &str, collection: &str) -> Result<CacheNamespace> {
        CacheNamespace::new(db, collection)
            .map_err(|_| ShelfError::InvalidName(format!("{}/{}", db, collection)))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("collections", &self.collection_names())
            .finish()
    }
}
