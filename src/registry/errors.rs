//! # Registry Errors

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Domain and bucket registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Bucket spec missing, malformed or naming an unknown kind
    #[error("Invalid bucket spec: {0}")]
    InvalidSpec(String),

    /// Empty or otherwise unusable domain/bucket name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Bucket not found: {domain}/{bucket}")]
    BucketNotFound { domain: String, bucket: String },

    /// Bucket exists with a different kind
    #[error("Bucket {domain}/{bucket} already exists as {existing}")]
    Conflict {
        domain: String,
        bucket: String,
        existing: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RegistryError {
    /// Whether the error means "nothing lives at this address"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::DomainNotFound(_) | RegistryError::BucketNotFound { .. }
        )
    }
}
