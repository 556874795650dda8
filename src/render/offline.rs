//! Renderer that is never reachable.
//!
//! Used when the service should serve only what it already has stored.

use super::errors::RenderError;
use super::renderer::{RenderFuture, RenderRequest, Renderer};

#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineRenderer;

impl Renderer for OfflineRenderer {
    fn render<'a>(&'a self, _request: &'a RenderRequest) -> RenderFuture<'a> {
        Box::pin(async { Err(RenderError::Upstream("renderer offline".into())) })
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
