//! Storage Integrity Tests
//!
//! The record log is append-only and checksum-verified. Damage anywhere in
//! the log must stop the store from opening; it is never skipped or
//! silently truncated.

use revstore::storage::{
    FileStore, KeyValueStore, KvRecord, LogReader, StorageErrorCode, LOG_FILE_NAME,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOG_FILE_NAME)
}

fn write_records(data_dir: &Path, records: &[(&str, &[u8])]) {
    let store = FileStore::open(data_dir).unwrap();
    for (key, value) in records {
        store.put(key, value).unwrap();
    }
}

fn assert_corruption(data_dir: &Path) {
    match FileStore::open(data_dir) {
        Ok(_) => panic!("corrupted log must not open"),
        Err(e) => {
            assert_eq!(e.code(), StorageErrorCode::DataCorruption);
            assert!(e.is_fatal());
        }
    }
}

// =============================================================================
// Corruption is never ignored
// =============================================================================

/// A flipped byte inside a record fails the open.
#[test]
fn test_flipped_byte_fails_open() {
    let temp_dir = create_temp_data_dir();
    write_records(temp_dir.path(), &[("domain/en.wikipedia.test.local", b"{}")]);

    let path = log_path(temp_dir.path());
    let mut contents = fs::read(&path).unwrap();
    let mid = contents.len() / 2;
    contents[mid] ^= 0xFF;
    fs::write(&path, contents).unwrap();

    assert_corruption(temp_dir.path());
}

/// Damage to the trailing checksum bytes is detected.
#[test]
fn test_damaged_checksum_fails_open() {
    let temp_dir = create_temp_data_dir();
    write_records(temp_dir.path(), &[("k", b"value")]);

    let path = log_path(temp_dir.path());
    let mut contents = fs::read(&path).unwrap();
    let last = contents.len() - 1;
    contents[last] ^= 0x01;
    fs::write(&path, contents).unwrap();

    assert_corruption(temp_dir.path());
}

/// A partially written final record is corruption, not a clean end of log.
#[test]
fn test_truncated_tail_fails_open() {
    let temp_dir = create_temp_data_dir();
    write_records(temp_dir.path(), &[("a", b"first"), ("b", b"second")]);

    let path = log_path(temp_dir.path());
    let contents = fs::read(&path).unwrap();
    fs::write(&path, &contents[..contents.len() - 3]).unwrap();

    assert_corruption(temp_dir.path());
}

/// Damage in the middle of the log is reported even when later records
/// are intact.
#[test]
fn test_corruption_before_valid_records_fails_open() {
    let temp_dir = create_temp_data_dir();
    write_records(
        temp_dir.path(),
        &[("a", b"first"), ("b", b"second"), ("c", b"third")],
    );

    let path = log_path(temp_dir.path());
    let first_len = KvRecord::new("a", b"first".to_vec()).serialize().len();
    let mut contents = fs::read(&path).unwrap();
    contents[first_len + 6] ^= 0xFF;
    fs::write(&path, contents).unwrap();

    assert_corruption(temp_dir.path());
}

// =============================================================================
// Durability and append-only replay
// =============================================================================

/// Everything written before a reopen is readable after it.
#[test]
fn test_reopen_sees_all_keys() {
    let temp_dir = create_temp_data_dir();
    write_records(
        temp_dir.path(),
        &[
            ("item/d/b/Foo/html/rev/00000000000000000001", b"t1"),
            ("item/d/b/Foo/html/rev/00000000000000000002", b"t2"),
            ("item/d/b/Bar/html/latest", b"{}"),
        ],
    );

    let store = FileStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.key_count(), 3);
    assert_eq!(
        store.scan_keys("item/d/b/Foo/").unwrap(),
        vec![
            "item/d/b/Foo/html/rev/00000000000000000001",
            "item/d/b/Foo/html/rev/00000000000000000002",
        ]
    );
}

/// Overwriting a key appends; the latest record wins and older ones stay
/// in the log.
#[test]
fn test_overwrite_appends_and_latest_wins() {
    let temp_dir = create_temp_data_dir();
    write_records(temp_dir.path(), &[("latest", b"one"), ("latest", b"two")]);

    let store = FileStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.get("latest").unwrap().unwrap(), b"two");
    assert_eq!(store.key_count(), 1);
    drop(store);

    let mut reader = LogReader::open(&log_path(temp_dir.path())).unwrap();
    let records = reader.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].value, b"one");
    assert_eq!(records[1].value, b"two");
}

/// Appends after a reopen land after the replayed records.
#[test]
fn test_append_after_reopen() {
    let temp_dir = create_temp_data_dir();
    write_records(temp_dir.path(), &[("a", b"1")]);
    write_records(temp_dir.path(), &[("b", b"2")]);

    let store = FileStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.get("a").unwrap().unwrap(), b"1");
    assert_eq!(store.get("b").unwrap().unwrap(), b"2");

    let expected = (KvRecord::new("a", b"1".to_vec()).serialize().len()
        + KvRecord::new("b", b"2".to_vec()).serialize().len()) as u64;
    assert_eq!(store.log_size(), expected);
}

/// An empty log is a valid, empty store.
#[test]
fn test_empty_log_opens() {
    let temp_dir = create_temp_data_dir();
    fs::write(log_path(temp_dir.path()), b"").unwrap();

    let store = FileStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.key_count(), 0);
    assert!(store.get("anything").unwrap().is_none());
}
