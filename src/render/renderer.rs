//! Renderer collaborator

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use super::errors::RenderResult;

/// One property a render must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRequest {
    pub name: String,
    /// Content type to report when the backend does not supply one
    pub default_content_type: String,
}

/// What to render: one or more properties of a title at a revision, all
/// produced by a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub domain: String,
    pub title: String,
    pub revision: u64,
    pub properties: Vec<PropertyRequest>,
}

/// A rendered artifact for one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPart {
    pub property: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Everything one render produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub parts: Vec<RenderedPart>,
}

impl Rendered {
    pub fn part(&self, property: &str) -> Option<&RenderedPart> {
        self.parts.iter().find(|part| part.property == property)
    }
}

pub type RenderFuture<'a> = Pin<Box<dyn Future<Output = RenderResult<Rendered>> + Send + 'a>>;

/// Turns (domain, title, properties, revision) into bytes.
///
/// One call is one attempt; implementations do not retry. A successful
/// render carries a part for every requested property.
pub trait Renderer: Send + Sync {
    fn render<'a>(&'a self, request: &'a RenderRequest) -> RenderFuture<'a>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
