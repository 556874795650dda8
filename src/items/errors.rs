//! Item store errors

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for item store operations
pub type ItemResult<T> = Result<T, ItemError>;

#[derive(Debug, Error)]
pub enum ItemError {
    /// No snapshot (or no latest pointer) at the requested address
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request cannot be served as addressed (e.g. PUT without a revision)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Token already names a snapshot with different content
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
