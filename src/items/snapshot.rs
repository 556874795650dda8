//! Item addresses and snapshots

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::GenerationToken;
use crate::storage::{keys, StorageError};

const ITEM_ROOT: &str = "item";
const SNAPSHOT_SEGMENT: &str = "tid";
const REVISION_SEGMENT: &str = "rev";
const LATEST_SEGMENT: &str = "latest";

/// Address of one revision lineage: a title, optionally split by property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub domain: String,
    pub bucket: String,
    pub title: String,
    pub property: Option<String>,
}

impl ItemKey {
    pub fn new(domain: &str, bucket: &str, title: &str, property: Option<&str>) -> Self {
        Self {
            domain: domain.to_string(),
            bucket: bucket.to_string(),
            title: title.to_string(),
            property: property.map(str::to_string),
        }
    }

    fn segments(&self) -> Vec<&str> {
        let mut segments = vec![
            ITEM_ROOT,
            self.domain.as_str(),
            self.bucket.as_str(),
            self.title.as_str(),
        ];
        if let Some(property) = &self.property {
            segments.push(property.as_str());
        }
        segments
    }

    fn key_with(&self, tail: &[&str]) -> String {
        let mut segments = self.segments();
        segments.extend_from_slice(tail);
        keys::key_path(&segments)
    }

    pub(crate) fn snapshot_key(&self, token: &GenerationToken) -> String {
        let token = token.to_string();
        self.key_with(&[SNAPSHOT_SEGMENT, token.as_str()])
    }

    /// Zero-padded so that key order matches numeric order.
    pub(crate) fn revision_key(&self, revision: u64) -> String {
        let padded = format!("{:020}", revision);
        self.key_with(&[REVISION_SEGMENT, padded.as_str()])
    }

    pub(crate) fn revision_prefix(&self) -> String {
        let mut segments = self.segments();
        segments.push(REVISION_SEGMENT);
        keys::key_prefix(&segments)
    }

    pub(crate) fn latest_key(&self) -> String {
        self.key_with(&[LATEST_SEGMENT])
    }

    /// Prefix under which every item of a bucket lives.
    pub(crate) fn bucket_prefix(domain: &str, bucket: &str) -> String {
        keys::key_prefix(&[ITEM_ROOT, domain, bucket])
    }

    pub(crate) fn root_prefix() -> String {
        format!("{}/", ITEM_ROOT)
    }

    /// Token embedded in a snapshot key, if `key` is one.
    pub(crate) fn token_from_snapshot_key(key: &str) -> Option<GenerationToken> {
        let (_, tail) = key.rsplit_once(&format!("/{}/", SNAPSHOT_SEGMENT))?;
        GenerationToken::parse(tail).ok()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.bucket, self.title)?;
        if let Some(property) = &self.property {
            write!(f, "/{}", property)?;
        }
        Ok(())
    }
}

/// One immutable stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub token: GenerationToken,
    /// Numeric revision the snapshot belongs to, if any
    pub revision: Option<u64>,
    pub content_type: String,
    pub body: Bytes,
}

impl Snapshot {
    pub fn same_content(&self, content_type: &str, body: &[u8]) -> bool {
        self.content_type == content_type && self.body.as_ref() == body
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, StorageError> {
        let stored = StoredSnapshot {
            token: self.token,
            revision: self.revision,
            content_type: self.content_type.clone(),
            body: STANDARD.encode(&self.body),
            written_at: Utc::now(),
        };
        serde_json::to_vec(&stored).map_err(|e| {
            StorageError::write_failed(format!("Failed to encode snapshot {}", self.token), e.into())
        })
    }

    pub(crate) fn decode(key: &str, value: &[u8]) -> Result<Self, StorageError> {
        let stored: StoredSnapshot = serde_json::from_slice(value)
            .map_err(|e| StorageError::corruption_for_key(key, format!("Undecodable snapshot: {}", e)))?;
        let body = STANDARD
            .decode(stored.body.as_bytes())
            .map_err(|e| StorageError::corruption_for_key(key, format!("Undecodable body: {}", e)))?;
        Ok(Self {
            token: stored.token,
            revision: stored.revision,
            content_type: stored.content_type,
            body: Bytes::from(body),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct StoredSnapshot {
    token: GenerationToken,
    revision: Option<u64>,
    content_type: String,
    body: String,
    written_at: DateTime<Utc>,
}

/// Value of the per-item `latest` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPointer {
    pub revision: Option<u64>,
    pub token: GenerationToken,
}
