//! Renderer backed by a Parsoid-style HTTP service
//!
//! A single property is fetched from
//! `GET {base_url}/{domain}/v3/page/{property}/{title}/{revision}`.
//! Several properties come from one
//! `GET {base_url}/{domain}/v3/page/pagebundle/{title}/{revision}` whose
//! JSON body carries one `{headers, body}` entry per property.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;

use super::errors::{RenderError, RenderResult};
use super::renderer::{
    PropertyRequest, RenderFuture, RenderRequest, Rendered, RenderedPart, Renderer,
};

const BUNDLE_SEGMENT: &str = "pagebundle";

/// One property inside a pagebundle response
#[derive(Debug, Deserialize)]
struct BundleEntry {
    #[serde(default)]
    headers: HashMap<String, String>,
    /// HTML arrives as a string, JSON properties as inline JSON
    body: serde_json::Value,
}

pub struct HttpRenderer {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRenderer {
    pub fn new(base_url: &str, timeout: Duration) -> RenderResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RenderError::Upstream(format!("invalid renderer url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RenderError::Upstream(format!(
                "renderer url '{}' cannot take a path",
                base_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenderError::Upstream(format!("failed to build http client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    /// Segments are percent-encoded, so titles may contain `/` or `?`.
    fn url_for(&self, request: &RenderRequest) -> RenderResult<Url> {
        let endpoint = match request.properties.as_slice() {
            [single] => single.name.as_str(),
            [] => return Err(RenderError::Upstream("render request names no property".into())),
            _ => BUNDLE_SEGMENT,
        };

        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RenderError::Upstream("renderer url cannot take a path".into()))?;
            segments
                .pop_if_empty()
                .extend([request.domain.as_str(), "v3", "page", endpoint])
                .push(&request.title)
                .push(&request.revision.to_string());
        }
        Ok(url)
    }

    async fn fetch(&self, request: &RenderRequest) -> RenderResult<Rendered> {
        let url = self.url_for(request)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RenderError::Upstream(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RenderError::NotFound(format!(
                "{}/{} at {}",
                request.domain, request.title, request.revision
            )));
        }
        if !status.is_success() {
            return Err(RenderError::Upstream(format!("GET {} returned {}", url, status)));
        }

        match request.properties.as_slice() {
            [single] => {
                let part = Self::single_part(single, response, &url).await?;
                Ok(Rendered { parts: vec![part] })
            }
            properties => Self::bundle_parts(properties, response, &url).await,
        }
    }

    async fn single_part(
        property: &PropertyRequest,
        response: Response,
        url: &Url,
    ) -> RenderResult<RenderedPart> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| property.default_content_type.clone());
        let body = response
            .bytes()
            .await
            .map_err(|e| RenderError::Upstream(format!("reading body of {} failed: {}", url, e)))?;

        Ok(RenderedPart {
            property: property.name.clone(),
            content_type,
            body,
        })
    }

    async fn bundle_parts(
        properties: &[PropertyRequest],
        response: Response,
        url: &Url,
    ) -> RenderResult<Rendered> {
        let mut bundle: HashMap<String, BundleEntry> = response
            .json()
            .await
            .map_err(|e| RenderError::Upstream(format!("undecodable bundle from {}: {}", url, e)))?;

        let mut parts = Vec::with_capacity(properties.len());
        for property in properties {
            let entry = bundle.remove(&property.name).ok_or_else(|| {
                RenderError::Upstream(format!("bundle from {} has no {}", url, property.name))
            })?;
            let content_type = entry
                .headers
                .iter()
                .find(|(name, value)| name.eq_ignore_ascii_case("content-type") && !value.is_empty())
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| property.default_content_type.clone());
            let body = match entry.body {
                serde_json::Value::String(text) => Bytes::from(text),
                other => Bytes::from(other.to_string()),
            };
            parts.push(RenderedPart {
                property: property.name.clone(),
                content_type,
                body,
            });
        }
        Ok(Rendered { parts })
    }
}

impl Renderer for HttpRenderer {
    fn render<'a>(&'a self, request: &'a RenderRequest) -> RenderFuture<'a> {
        Box::pin(self.fetch(request))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{header, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn fake_backend(
        Path((domain, property, title, revision)): Path<(String, String, String, u64)>,
    ) -> axum::response::Response {
        match (title.as_str(), property.as_str()) {
            ("Missing", _) => AxumStatus::NOT_FOUND.into_response(),
            ("Broken", _) => AxumStatus::INTERNAL_SERVER_ERROR.into_response(),
            ("Partial", BUNDLE_SEGMENT) => Json(serde_json::json!({
                "html": {"headers": {"content-type": "text/html"}, "body": "<p/>"},
            }))
            .into_response(),
            (_, BUNDLE_SEGMENT) => Json(serde_json::json!({
                "html": {
                    "headers": {"content-type": "text/html; charset=utf-8; profile=test"},
                    "body": format!("<p>{}|{}|{}</p>", domain, title, revision),
                },
                "data-parsoid": {
                    "body": {"counter": 3, "ids": {}},
                },
            }))
            .into_response(),
            _ => (
                [(header::CONTENT_TYPE, "text/html; charset=utf-8; profile=test")],
                format!("{}|{}|{}|{}", domain, property, title, revision),
            )
                .into_response(),
        }
    }

    async fn spawn_backend() -> String {
        let app = Router::new().route(
            "/:domain/v3/page/:property/:title/:revision",
            get(fake_backend),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn property(name: &str, default_content_type: &str) -> PropertyRequest {
        PropertyRequest {
            name: name.into(),
            default_content_type: default_content_type.into(),
        }
    }

    fn request(title: &str) -> RenderRequest {
        RenderRequest {
            domain: "en.wikipedia.test.local".into(),
            title: title.into(),
            revision: 624484477,
            properties: vec![property("html", "text/html; charset=UTF-8")],
        }
    }

    fn bundle_request(title: &str) -> RenderRequest {
        RenderRequest {
            properties: vec![
                property("html", "text/html; charset=UTF-8"),
                property("data-parsoid", "application/json; profile=data-parsoid"),
            ],
            ..request(title)
        }
    }

    #[test]
    fn test_url_encodes_title() {
        let renderer = HttpRenderer::new("http://parsoid.local/base/", Duration::from_secs(1)).unwrap();
        let url = renderer.url_for(&request("AC/DC?")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://parsoid.local/base/en.wikipedia.test.local/v3/page/html/AC%2FDC%3F/624484477"
        );
    }

    #[test]
    fn test_several_properties_use_pagebundle() {
        let renderer = HttpRenderer::new("http://parsoid.local", Duration::from_secs(1)).unwrap();
        let url = renderer.url_for(&bundle_request("Foobar")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://parsoid.local/en.wikipedia.test.local/v3/page/pagebundle/Foobar/624484477"
        );

        let empty = RenderRequest {
            properties: Vec::new(),
            ..request("Foobar")
        };
        assert!(renderer.url_for(&empty).is_err());
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(HttpRenderer::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_renders_from_backend() {
        let base = spawn_backend().await;
        let renderer = HttpRenderer::new(&base, Duration::from_secs(5)).unwrap();
        let rendered = renderer.render(&request("Foobar")).await.unwrap();
        let html = rendered.part("html").unwrap();
        assert_eq!(html.content_type, "text/html; charset=utf-8; profile=test");
        assert_eq!(
            html.body.as_ref(),
            b"en.wikipedia.test.local|html|Foobar|624484477"
        );
    }

    #[tokio::test]
    async fn test_renders_bundle_in_one_request() {
        let base = spawn_backend().await;
        let renderer = HttpRenderer::new(&base, Duration::from_secs(5)).unwrap();
        let rendered = renderer.render(&bundle_request("Foobar")).await.unwrap();
        assert_eq!(rendered.parts.len(), 2);

        let html = rendered.part("html").unwrap();
        assert_eq!(html.content_type, "text/html; charset=utf-8; profile=test");
        assert_eq!(
            html.body.as_ref(),
            b"<p>en.wikipedia.test.local|Foobar|624484477</p>"
        );

        let dp = rendered.part("data-parsoid").unwrap();
        assert_eq!(dp.content_type, "application/json; profile=data-parsoid");
        let parsed: serde_json::Value = serde_json::from_slice(&dp.body).unwrap();
        assert_eq!(parsed["counter"], 3);
    }

    #[tokio::test]
    async fn test_incomplete_bundle_is_upstream() {
        let base = spawn_backend().await;
        let renderer = HttpRenderer::new(&base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            renderer.render(&bundle_request("Partial")).await,
            Err(RenderError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_maps_backend_failures() {
        let base = spawn_backend().await;
        let renderer = HttpRenderer::new(&base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            renderer.render(&request("Missing")).await,
            Err(RenderError::NotFound(_))
        ));
        assert!(matches!(
            renderer.render(&bundle_request("Broken")).await,
            Err(RenderError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_upstream() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let renderer =
            HttpRenderer::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            renderer.render(&request("Foobar")).await,
            Err(RenderError::Upstream(_))
        ));
    }
}
