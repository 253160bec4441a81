//! Tests for the durable (logged) index
//!
//! These tests verify:
//! - State survives reopen through log replay
//! - Absent-key update/delete leave the log alone
//! - Torn log tails are dropped on open
//! - Compaction rewrites the log without losing data

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use shelfdb::config::WalSyncStrategy;
use shelfdb::index::{DurableIndex, IndexError, KeyValue, OrderedIndex};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const NO_COMPACTION: usize = usize::MAX;

fn setup() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("coll");
    (temp, dir)
}

fn create(dir: &PathBuf, threshold: usize) -> DurableIndex {
    DurableIndex::create(dir, 4, WalSyncStrategy::EveryWrite, threshold).unwrap()
}

fn reopen(dir: &PathBuf, threshold: usize) -> DurableIndex {
    DurableIndex::open(dir, 4, WalSyncStrategy::EveryWrite, threshold).unwrap()
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_create_makes_empty_log() {
    let (_temp, dir) = setup();
    let index = create(&dir, NO_COMPACTION);

    assert!(index.is_empty());
    assert!(index.log_path().exists());
    assert_eq!(index.log_entries(), 0);
    assert_eq!(index.dir(), dir.as_path());
}

#[test]
fn test_reopen_replays_writes() {
    let (_temp, dir) = setup();
    {
        let mut index = create(&dir, NO_COMPACTION);
        for i in 0..100 {
            index.insert(&format!("k{:03}", i), &i.to_string()).unwrap();
        }
        assert!(index.update("k001", "updated").unwrap());
        assert!(index.delete("k002").unwrap());
    }

    let index = reopen(&dir, NO_COMPACTION);
    assert_eq!(index.len(), 99);
    assert_eq!(index.find("k001").unwrap(), Some("updated".to_string()));
    assert_eq!(index.find("k002").unwrap(), None);
    assert_eq!(index.find("k099").unwrap(), Some("99".to_string()));
    index.tree().validate().unwrap();
}

#[test]
fn test_absent_key_mutations_are_not_logged() {
    let (_temp, dir) = setup();
    let mut index = create(&dir, NO_COMPACTION);
    index.insert("a", "1").unwrap();

    assert!(!index.update("missing", "x").unwrap());
    assert!(!index.delete("missing").unwrap());
    assert_eq!(index.log_entries(), 1);
}

#[test]
fn test_open_without_log_fails() {
    let (_temp, dir) = setup();
    std::fs::create_dir_all(&dir).unwrap();

    let result = DurableIndex::open(&dir, 4, WalSyncStrategy::EveryWrite, NO_COMPACTION);
    assert!(matches!(result, Err(IndexError::Io(_))));
}

#[test]
fn test_open_drops_torn_tail() {
    let (_temp, dir) = setup();
    let log_path = {
        let mut index = create(&dir, NO_COMPACTION);
        index.insert("a", "1").unwrap();
        index.insert("b", "2").unwrap();
        index.log_path()
    };
    {
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(&[0x42; 11]).unwrap();
    }

    let mut index = reopen(&dir, NO_COMPACTION);
    assert_eq!(
        index.find_all().unwrap(),
        vec![KeyValue::new("a", "1"), KeyValue::new("b", "2")]
    );

    // New writes land after the repaired tail and replay cleanly
    index.insert("c", "3").unwrap();
    drop(index);
    assert_eq!(reopen(&dir, NO_COMPACTION).len(), 3);
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_compact_keeps_live_entries_only() {
    let (_temp, dir) = setup();
    let mut index = create(&dir, NO_COMPACTION);
    for round in 0..5 {
        for i in 0..20 {
            index.insert(&format!("k{:02}", i), &round.to_string()).unwrap();
        }
    }
    assert_eq!(index.log_entries(), 100);

    index.compact().unwrap();
    assert_eq!(index.log_entries(), 20);
    assert!(!dir.join("index.log.compact").exists());

    drop(index);
    let index = reopen(&dir, NO_COMPACTION);
    assert_eq!(index.len(), 20);
    assert!(index.find_all().unwrap().iter().all(|kv| kv.value == "4"));
}

#[test]
fn test_threshold_triggers_compaction() {
    let (_temp, dir) = setup();
    let mut index = create(&dir, 10);

    for i in 0..50 {
        index.insert("hot", &i.to_string()).unwrap();
    }

    // Never more than live (1) + threshold (10) entries
    assert!(index.log_entries() <= 11, "log has {}", index.log_entries());
    assert_eq!(index.find("hot").unwrap(), Some("49".to_string()));

    drop(index);
    assert_eq!(
        reopen(&dir, 10).find("hot").unwrap(),
        Some("49".to_string())
    );
}

#[test]
fn test_writes_after_compaction_survive_reopen() {
    let (_temp, dir) = setup();
    {
        let mut index = create(&dir, NO_COMPACTION);
        index.insert("a", "1").unwrap();
        index.insert("a", "2").unwrap();
        index.compact().unwrap();
        index.insert("b", "3").unwrap();
        index.delete("a").unwrap();
    }

    let index = reopen(&dir, NO_COMPACTION);
    assert_eq!(index.find_all().unwrap(), vec![KeyValue::new("b", "3")]);
}
