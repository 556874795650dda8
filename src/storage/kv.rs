//! Key-value substrate
//!
//! Everything revstore persists goes through [`KeyValueStore`]: simple get,
//! put and ordered prefix scans, with read-after-write consistency inside one
//! process. [`FileStore`] is the durable implementation over the record log;
//! [`MemoryStore`] keeps everything in memory.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use super::errors::{StorageError, StorageResult};
use super::reader::LogReader;
use super::record::KvRecord;
use super::writer::LogWriter;

/// Backend trait for the durable key space
pub trait KeyValueStore: Send + Sync {
    /// Latest value written for `key`
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Durably write `value` under `key`, superseding any earlier value
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Keys starting with `prefix`, in ascending byte order
    fn scan_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Key/value pairs starting with `prefix`, in ascending key order
    fn scan(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let mut entries = Vec::new();
        for key in self.scan_keys(prefix)? {
            if let Some(value) = self.get(&key)? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }
}

fn keys_with_prefix<V>(map: &BTreeMap<String, V>, prefix: &str) -> Vec<String> {
    map.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Durable store over `store.log`.
///
/// The offset index (key → offset of its latest record) lives in memory and
/// is rebuilt by scanning the log on open; the log is the source of truth.
pub struct FileStore {
    writer: Mutex<LogWriter>,
    reader: Mutex<LogReader>,
    offsets: RwLock<BTreeMap<String, u64>>,
}

impl FileStore {
    /// Open (or create) the store in `data_dir`.
    ///
    /// Fails with `REVSTORE_DATA_CORRUPTION` if any record is damaged.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        let writer = LogWriter::open(data_dir)?;
        let mut reader = LogReader::open(writer.path())?;
        let offsets = Self::build_offset_index(&mut reader)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            offsets: RwLock::new(offsets),
        })
    }

    fn build_offset_index(reader: &mut LogReader) -> StorageResult<BTreeMap<String, u64>> {
        let mut offsets = BTreeMap::new();
        loop {
            let offset = reader.current_offset();
            match reader.read_next()? {
                // Latest record wins (by file order)
                Some(record) => {
                    offsets.insert(record.key, offset);
                }
                None => break,
            }
        }
        Ok(offsets)
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.offsets.read().map(|o| o.len()).unwrap_or(0)
    }

    /// Size of the log in bytes.
    pub fn log_size(&self) -> u64 {
        self.writer
            .lock()
            .map(|w| w.current_offset())
            .unwrap_or(0)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let offset = {
            let offsets = self.offsets.read().map_err(|_| StorageError::lock_poisoned())?;
            match offsets.get(key) {
                Some(offset) => *offset,
                None => return Ok(None),
            }
        };

        let mut reader = self.reader.lock().map_err(|_| StorageError::lock_poisoned())?;
        let record = reader.read_at(offset)?;
        if record.key != key {
            return Err(StorageError::corruption_at_offset(
                offset,
                format!("Index points at record for '{}'", record.key),
            ));
        }
        Ok(Some(record.value))
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut writer = self.writer.lock().map_err(|_| StorageError::lock_poisoned())?;
        let offset = writer.append(&KvRecord::new(key, value.to_vec()))?;

        // Index is updated while the writer lock is still held so that two
        // writes to one key land in the index in log order.
        let mut offsets = self.offsets.write().map_err(|_| StorageError::lock_poisoned())?;
        offsets.insert(key.to_string(), offset);
        Ok(())
    }

    fn scan_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let offsets = self.offsets.read().map_err(|_| StorageError::lock_poisoned())?;
        Ok(keys_with_prefix(&offsets, prefix))
    }
}

/// Non-durable store for tests and throwaway instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| StorageError::lock_poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::lock_poisoned())?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn scan_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| StorageError::lock_poisoned())?;
        Ok(keys_with_prefix(&entries, prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &dyn KeyValueStore) {
        assert!(store.get("a/1").unwrap().is_none());

        store.put("a/1", b"one").unwrap();
        store.put("a/2", b"two").unwrap();
        store.put("b/1", b"other").unwrap();
        store.put("a/1", b"uno").unwrap();

        assert_eq!(store.get("a/1").unwrap().unwrap(), b"uno");
        assert_eq!(store.scan_keys("a/").unwrap(), vec!["a/1", "a/2"]);
        assert_eq!(
            store.scan("a/").unwrap(),
            vec![
                ("a/1".to_string(), b"uno".to_vec()),
                ("a/2".to_string(), b"two".to_vec())
            ]
        );
        assert!(store.scan_keys("c/").unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_semantics() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store_semantics() {
        let temp_dir = TempDir::new().unwrap();
        exercise(&FileStore::open(temp_dir.path()).unwrap());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(temp_dir.path()).unwrap();
            store.put("k", b"first").unwrap();
            store.put("k", b"second").unwrap();
            store.put("j", b"other").unwrap();
        }

        let store = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.key_count(), 2);
        assert_eq!(store.get("k").unwrap().unwrap(), b"second");
        store.put("k", b"third").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"third");
    }

    #[test]
    fn test_file_store_refuses_corrupt_log() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(temp_dir.path()).unwrap();
            store.put("k", b"value").unwrap();
        }

        let log_path = temp_dir.path().join(super::super::writer::LOG_FILE_NAME);
        let mut contents = std::fs::read(&log_path).unwrap();
        let mid = contents.len() / 2;
        contents[mid] ^= 0xFF;
        std::fs::write(&log_path, contents).unwrap();

        let err = FileStore::open(temp_dir.path()).err().unwrap();
        assert!(err.is_fatal());
    }
}
