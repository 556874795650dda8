//! Render errors

use std::sync::Arc;

use thiserror::Error;

use crate::items::ItemError;
use crate::storage::StorageError;

/// Result type for renderer calls
pub type RenderResult<T> = Result<T, RenderError>;

/// Failure reported by a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The backend knows nothing at this title/revision
    #[error("Renderer has no content: {0}")]
    NotFound(String),

    /// Backend unreachable, timed out, or answered with an error
    #[error("Renderer failed: {0}")]
    Upstream(String),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors from the render-on-miss pipeline.
///
/// Cloneable so that every request joined to one in-flight render receives
/// the same outcome.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Miss in a bucket whose kind is never rendered
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Item(Arc<ItemError>),
}

impl From<ItemError> for PipelineError {
    fn from(err: ItemError) -> Self {
        PipelineError::Item(Arc::new(err))
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        PipelineError::Item(Arc::new(ItemError::Storage(err)))
    }
}
