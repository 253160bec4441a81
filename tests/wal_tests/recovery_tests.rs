//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from clean and empty logs
//! - Truncation of torn tails
//! - Stopping at corrupted frames and non-monotonic LSNs
//! - Verify mode (stats only, file untouched)

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use shelfdb::config::WalSyncStrategy;
use shelfdb::wal::{Operation, WalEntry, WalRecovery, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i),
                value: format!("value{}", i),
            })
            .unwrap();
    }
}

/// Write raw frames directly to a file (for crafting corruption)
fn write_raw_entries(path: &PathBuf, entries: &[WalEntry]) {
    let mut file = File::create(path).unwrap();
    for entry in entries {
        file.write_all(&entry.encode().unwrap()).unwrap();
    }
    file.sync_all().unwrap();
}

fn file_len(path: &PathBuf) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

// =============================================================================
// Clean Log Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result, Default::default());
}

#[test]
fn test_recover_multiple_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 10);
    assert_eq!(result.valid_bytes, file_len(&wal_path));
    assert!(!result.was_truncated);

    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.lsn, (i + 1) as u64);
    }
}

#[test]
fn test_recover_missing_file_fails() {
    let (_temp, wal_path) = setup_temp_wal();
    assert!(WalRecovery::recover(&wal_path).is_err());
}

// =============================================================================
// Damaged Tail Tests
// =============================================================================

#[test]
fn test_recover_truncates_partial_write() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let good_len = file_len(&wal_path);

    {
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap();
    }

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert_eq!(file_len(&wal_path), good_len);

    // A second pass finds nothing left to repair
    let (_, again) = WalRecovery::recover(&wal_path).unwrap();
    assert!(!again.was_truncated);
    assert_eq!(again.entries_recovered, 3);
}

#[test]
fn test_recover_stops_at_crc_mismatch() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let len = file_len(&wal_path);

    // Flip the last byte of the final payload
    {
        let mut bytes = std::fs::read(&wal_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&wal_path, bytes).unwrap();
    }

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.last_lsn, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert!(file_len(&wal_path) < len);
}

#[test]
fn test_recover_stops_at_non_monotonic_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    let op = |k: &str| Operation::Put {
        key: k.to_string(),
        value: "v".to_string(),
    };
    write_raw_entries(
        &wal_path,
        &[
            WalEntry::new(1, op("a")),
            WalEntry::new(2, op("b")),
            WalEntry::new(2, op("c")),
        ],
    );

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.last_lsn, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    {
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&[0xEE; 5]).unwrap();
    }
    let len_before = file_len(&wal_path);

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
    assert_eq!(file_len(&wal_path), len_before);
}
