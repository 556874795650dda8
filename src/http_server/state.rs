//! Shared router state

use std::sync::Arc;

use thiserror::Error;

use crate::items::{ItemError, ItemStore};
use crate::observability::MetricsRegistry;
use crate::registry::{BucketRegistry, RegistryError};
use crate::render::{RenderPipeline, Renderer};
use crate::storage::KeyValueStore;

/// Failure while loading persisted state
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to load registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to load items: {0}")]
    Items(#[from] ItemError),
}

/// State shared by every handler
pub struct AppState {
    pub registry: BucketRegistry,
    pub pipeline: RenderPipeline,
    pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
    /// Load registry and item state from `store` and wire up `renderer`.
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, StartupError> {
        let metrics = Arc::new(MetricsRegistry::new());
        let registry = BucketRegistry::open(Arc::clone(&store))?;
        let items = Arc::new(ItemStore::open(store)?);
        let pipeline = RenderPipeline::new(items, renderer, Arc::clone(&metrics));

        Ok(Self {
            registry,
            pipeline,
            metrics,
        })
    }
}
