//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::index::{IndexError, IndexResult};

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped (everything after the first bad
    /// frame is discarded, so this is 0 or 1)
    pub entries_corrupted: u64,

    /// Last valid LSN (0 if the log is empty)
    pub last_lsn: u64,

    /// Byte length of the valid prefix of the log
    pub valid_bytes: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted entry
    /// 3. Truncate the file to the valid prefix
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> IndexResult<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result, file_len) = Self::scan(path)?;

        if result.valid_bytes < file_len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_bytes)?;
            file.sync_all()?;
            result.was_truncated = true;

            tracing::warn!(
                path = %path.display(),
                dropped_bytes = file_len - result.valid_bytes,
                last_lsn = result.last_lsn,
                "Truncated damaged WAL tail"
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> IndexResult<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    /// Read the valid prefix of the log
    fn scan(path: &Path) -> IndexResult<(Vec<WalEntry>, RecoveryResult, u64)> {
        let file_len = std::fs::metadata(path)?.len();
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    if entry.lsn <= result.last_lsn {
                        tracing::warn!(
                            lsn = entry.lsn,
                            previous = result.last_lsn,
                            "Non-monotonic LSN in WAL"
                        );
                        result.entries_corrupted += 1;
                        break;
                    }
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    result.valid_bytes = reader.valid_offset();
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(IndexError::WalCorruption(reason)) => {
                    tracing::warn!(path = %path.display(), %reason, "WAL corruption detected");
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result, file_len))
    }
}
