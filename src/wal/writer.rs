//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! An append either leaves its frame durably in the log and returns the LSN,
//! or returns an error with the log cut back to where it was. A frame whose
//! write or fsync failed is never left behind for a later replay.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::index::IndexResult;

use super::{Operation, RecoveryResult, WalEntry, WalRecovery};

/// Byte sink a log is appended to
///
/// Implemented for [`File`]; writes always land at the current end.
pub trait LogFile: Write + Send {
    /// Flush written data to stable storage
    fn sync_data(&self) -> io::Result<()>;

    /// Cut the log to `len` bytes
    fn set_len(&self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

/// Writes entries to the WAL file
pub struct WalWriter<F = File> {
    /// Path of the log file
    path: PathBuf,

    /// Append-mode file handle
    file: F,

    /// Byte length of the log (end of the last complete frame)
    len: u64,

    /// LSN assigned to the next appended entry
    next_lsn: u64,

    /// When to fsync
    sync_strategy: WalSyncStrategy,

    /// Entries appended since the last fsync
    unsynced: usize,

    /// Entries currently in the file
    entries_written: u64,
}

impl WalWriter<File> {
    /// Open or create a WAL file
    ///
    /// An existing log is scanned first: LSNs resume after the last valid
    /// entry and a torn tail is truncated so new frames never follow garbage.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> IndexResult<Self> {
        let recovery = if path.exists() {
            WalRecovery::recover(path)?.1
        } else {
            RecoveryResult::default()
        };

        Self::resume(path, sync_strategy, &recovery)
    }

    /// Reopen a log that [`WalRecovery::recover`] has just repaired
    pub fn resume(
        path: &Path,
        sync_strategy: WalSyncStrategy,
        recovery: &RecoveryResult,
    ) -> IndexResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self::from_file(
            path,
            file,
            len,
            recovery.entries_recovered,
            recovery.last_lsn + 1,
            sync_strategy,
        ))
    }

    /// Create a WAL file, discarding any previous contents
    pub fn create(path: &Path, sync_strategy: WalSyncStrategy) -> IndexResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        drop(file);
        Self::open(path, sync_strategy)
    }
}

impl<F: LogFile> WalWriter<F> {
    /// Append to an already-open log of `len` bytes holding `entries` entries
    pub fn from_file(
        path: impl Into<PathBuf>,
        file: F,
        len: u64,
        entries: u64,
        next_lsn: u64,
        sync_strategy: WalSyncStrategy,
    ) -> Self {
        Self {
            path: path.into(),
            file,
            len,
            next_lsn,
            sync_strategy,
            unsynced: 0,
            entries_written: entries,
        }
    }

    /// Append an operation to the WAL, returning its LSN
    ///
    /// A failed write, or a failed fsync the strategy called for, is rolled
    /// back to the previous end of the log and leaves the counters as they
    /// were.
    pub fn append(&mut self, operation: Operation) -> IndexResult<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, operation).encode()?;
        let prev_len = self.len;

        if let Err(e) = self.file.write_all(&frame) {
            self.cut_back(prev_len);
            return Err(e.into());
        }

        let sync_due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
        };
        if sync_due {
            if let Err(e) = self.sync() {
                self.cut_back(prev_len);
                return Err(e);
            }
        } else {
            self.unsynced += 1;
        }

        self.len = prev_len + frame.len() as u64;
        self.next_lsn += 1;
        self.entries_written += 1;

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> IndexResult<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry (LSNs keep increasing)
    pub fn truncate(&mut self) -> IndexResult<()> {
        self.file.set_len(0)?;
        self.file.sync_data()?;
        self.len = 0;
        self.unsynced = 0;
        self.entries_written = 0;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Number of entries currently in the log
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Size of the log in bytes
    pub fn len_bytes(&self) -> u64 {
        self.len
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop a partial or unsynced frame so the log stays replayable
    fn cut_back(&self, len: u64) {
        if let Err(e) = self.file.set_len(len) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to roll back WAL frame");
        }
    }
}
