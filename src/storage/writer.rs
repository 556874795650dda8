//! Append-only log writer with fsync enforcement
//!
//! A write is not acknowledged until the record has been fsynced. Records are
//! never rewritten in place.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::record::KvRecord;

/// File name of the record log inside the data directory.
pub const LOG_FILE_NAME: &str = "store.log";

/// Appends records to `<data_dir>/store.log`.
pub struct LogWriter {
    log_path: PathBuf,
    file: File,
    current_offset: u64,
}

impl LogWriter {
    /// Opens or creates the log file, creating `data_dir` if needed.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        if !data_dir.exists() {
            fs::create_dir_all(data_dir).map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to create data directory: {}", data_dir.display()),
                    e,
                )
            })?;
        }

        let log_path = data_dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to open log file: {}", log_path.display()),
                    e,
                )
            })?;

        let current_offset = file
            .metadata()
            .map_err(|e| StorageError::write_failed("Failed to read file metadata", e))?
            .len();

        Ok(Self {
            log_path,
            file,
            current_offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Offset at which the next record will be written.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Appends a record and fsyncs. Returns the record's offset.
    pub fn append(&mut self, record: &KvRecord) -> StorageResult<u64> {
        let serialized = record.serialize();
        let offset = self.current_offset;

        self.file.write_all(&serialized).map_err(|e| {
            StorageError::write_failed(format!("Failed to write record: {}", record.key), e)
        })?;

        self.file.sync_all().map_err(|e| {
            StorageError::write_failed(
                format!("fsync failed after writing record: {}", record.key),
                e,
            )
        })?;

        self.current_offset += serialized.len() as u64;
        Ok(offset)
    }
}
