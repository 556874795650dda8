//! Rendering
//!
//! The [`Renderer`] collaborator and its implementations, plus the
//! [`RenderPipeline`] that renders on a miss and stores the result.

mod errors;
mod http;
mod offline;
mod pipeline;
mod renderer;
mod synthetic;

pub use errors::{PipelineError, PipelineResult, RenderError, RenderResult};
pub use http::HttpRenderer;
pub use offline::OfflineRenderer;
pub use pipeline::RenderPipeline;
pub use renderer::{
    PropertyRequest, RenderFuture, RenderRequest, Rendered, RenderedPart, Renderer,
};
pub use synthetic::SyntheticRenderer;
