//! Durable key-value substrate for revstore
//!
//! All persistent state (domains, buckets, snapshots, revision pointers)
//! lives in one append-only record log.
//!
//! # Design Principles
//!
//! - Append-only (no in-place updates)
//! - Checksum-verified on every read
//! - Latest record wins for the same key
//! - fsync before a write is acknowledged
//! - Any corruption is fatal; it is never skipped

mod errors;
pub mod keys;
mod kv;
mod reader;
mod record;
mod writer;

pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use reader::LogReader;
pub use record::{compute_checksum, KvRecord};
pub use writer::{LogWriter, LOG_FILE_NAME};
