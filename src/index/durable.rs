//! Durable Index
//!
//! A [`BTree`] whose mutations are appended to a WAL before they are applied.
//!
//! ## On-disk layout
//! ```text
//! {collection dir}/
//!   └── index.log     (WAL of Put/Delete operations)
//! ```
//!
//! Loading replays the log into a fresh tree. Once the log carries more than
//! `compaction_threshold` entries beyond the live key count, it is rewritten
//! as a snapshot holding one `Put` per live key.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::wal::{Operation, WalRecovery, WalWriter};

use super::{BTree, IndexResult, KeyValue, OrderedIndex};

/// Persistent ordered index for one collection
pub struct DurableIndex {
    /// Directory holding the log
    dir: PathBuf,

    /// In-memory tree (source of answers)
    tree: BTree,

    /// Log of every applied mutation
    wal: WalWriter,

    /// Sync strategy, reused when the log is rewritten
    sync_strategy: WalSyncStrategy,

    /// Surplus log entries tolerated before a snapshot rewrite
    compaction_threshold: usize,
}

impl DurableIndex {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const LOG_FILENAME: &'static str = "index.log";
    const COMPACT_FILENAME: &'static str = "index.log.compact";

    /// Create an empty index in `dir`, discarding any previous log
    pub fn create(
        dir: &Path,
        order: usize,
        sync_strategy: WalSyncStrategy,
        compaction_threshold: usize,
    ) -> IndexResult<Self> {
        let tree = BTree::new(order)?;
        fs::create_dir_all(dir)?;
        let wal = WalWriter::create(&dir.join(Self::LOG_FILENAME), sync_strategy)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            tree,
            wal,
            sync_strategy,
            compaction_threshold,
        })
    }

    /// Rebuild an index from the log in `dir`
    pub fn open(
        dir: &Path,
        order: usize,
        sync_strategy: WalSyncStrategy,
        compaction_threshold: usize,
    ) -> IndexResult<Self> {
        let mut tree = BTree::new(order)?;
        let log_path = dir.join(Self::LOG_FILENAME);

        // A missing log surfaces as an I/O NotFound error
        let (entries, recovery) = WalRecovery::recover(&log_path)?;

        for entry in entries {
            match entry.operation {
                Operation::Put { key, value } => {
                    tree.put(key, value);
                }
                Operation::Delete { key } => {
                    tree.remove(&key);
                }
            }
        }

        tracing::debug!(
            dir = %dir.display(),
            entries = recovery.entries_recovered,
            keys = tree.len(),
            truncated = recovery.was_truncated,
            "Replayed index log"
        );

        let wal = WalWriter::resume(&log_path, sync_strategy, &recovery)?;

        let mut index = Self {
            dir: dir.to_path_buf(),
            tree,
            wal,
            sync_strategy,
            compaction_threshold,
        };
        index.maybe_compact();
        Ok(index)
    }

    /// Rewrite the log as a snapshot of the live keys
    pub fn compact(&mut self) -> IndexResult<()> {
        let tmp_path = self.dir.join(Self::COMPACT_FILENAME);
        let log_path = self.dir.join(Self::LOG_FILENAME);

        {
            // Sync once at the end rather than per entry
            let mut snapshot = WalWriter::create(
                &tmp_path,
                WalSyncStrategy::EveryNEntries { count: usize::MAX },
            )?;
            for (key, value) in self.tree.iter() {
                snapshot.append(Operation::Put {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
            }
            snapshot.sync()?;
        }

        let before = self.wal.entries_written();
        fs::rename(&tmp_path, &log_path)?;
        self.wal = WalWriter::open(&log_path, self.sync_strategy)?;

        tracing::debug!(
            dir = %self.dir.display(),
            before,
            after = self.wal.entries_written(),
            "Compacted index log"
        );
        Ok(())
    }

    /// Compact if the log has outgrown the live data; failures only warn
    fn maybe_compact(&mut self) {
        let live = self.tree.len() as u64;
        let limit = live.saturating_add(self.compaction_threshold as u64);
        if self.wal.entries_written() <= limit {
            return;
        }
        if let Err(e) = self.compact() {
            tracing::warn!(dir = %self.dir.display(), error = %e, "Index log compaction failed");
        }
    }

    /// Number of entries currently in the log
    pub fn log_entries(&self) -> u64 {
        self.wal.entries_written()
    }

    /// Path of the log file
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(Self::LOG_FILENAME)
    }

    /// Directory holding the index
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Borrow the in-memory tree
    pub fn tree(&self) -> &BTree {
        &self.tree
    }
}

impl OrderedIndex for DurableIndex {
    fn order(&self) -> usize {
        self.tree.order()
    }

    fn insert(&mut self, key: &str, value: &str) -> IndexResult<()> {
        self.wal.append(Operation::Put {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        self.tree.put(key.to_string(), value.to_string());
        self.maybe_compact();
        Ok(())
    }

    fn find(&self, key: &str) -> IndexResult<Option<String>> {
        Ok(self.tree.get(key).map(str::to_string))
    }

    fn update(&mut self, key: &str, value: &str) -> IndexResult<bool> {
        if !self.tree.contains_key(key) {
            return Ok(false);
        }
        self.wal.append(Operation::Put {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        self.tree.replace(key, value.to_string());
        self.maybe_compact();
        Ok(true)
    }

    fn delete(&mut self, key: &str) -> IndexResult<bool> {
        if !self.tree.contains_key(key) {
            return Ok(false);
        }
        self.wal.append(Operation::Delete {
            key: key.to_string(),
        })?;
        self.tree.remove(key);
        self.maybe_compact();
        Ok(true)
    }

    fn find_all(&self) -> IndexResult<Vec<KeyValue>> {
        self.tree.find_all()
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn sync(&mut self) -> IndexResult<()> {
        self.wal.sync()
    }
}
