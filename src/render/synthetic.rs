//! Deterministic local renderer
//!
//! Produces a small document per (title, property, revision) without any
//! backend. The same request always yields the same bytes.

use bytes::Bytes;

use super::renderer::{RenderFuture, RenderRequest, Rendered, RenderedPart, Renderer};

#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticRenderer;

impl SyntheticRenderer {
    fn body(request: &RenderRequest, property: &str) -> String {
        let title = escape_html(&request.title);
        match property {
            "data-parsoid" => serde_json::json!({
                "title": request.title,
                "revision": request.revision,
                "ids": {},
            })
            .to_string(),
            "wikitext" => format!("'''{}''' at revision {}.", request.title, request.revision),
            _ => format!(
                "<!DOCTYPE html>\n<html><head><title>{t}</title></head>\
                 <body><p>{t} at revision {r}.</p></body></html>",
                t = title,
                r = request.revision
            ),
        }
    }
}

impl Renderer for SyntheticRenderer {
    fn render<'a>(&'a self, request: &'a RenderRequest) -> RenderFuture<'a> {
        Box::pin(async move {
            let parts = request
                .properties
                .iter()
                .map(|property| RenderedPart {
                    property: property.name.clone(),
                    content_type: property.default_content_type.clone(),
                    body: Bytes::from(Self::body(request, &property.name)),
                })
                .collect();
            Ok(Rendered { parts })
        })
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
