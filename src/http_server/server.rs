//! # HTTP Server
//!
//! Combines the `/v1` routes with health and metrics endpoints and serves
//! them on a tokio listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;

use super::config::HttpServerConfig;
use super::problem::ApiError;
use super::routes::{get_v1, options_v1, put_v1};
use super::state::AppState;
use crate::observability::{log_event_with_fields, Event};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    renderer: &'static str,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        renderer: state.pipeline.renderer_name(),
    };
    (StatusCode::OK, Json(response))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.metrics.to_json()))
}

async fn fallback_handler(uri: Uri) -> ApiError {
    ApiError::not_found(format!("no route for {}", uri.path()))
}

pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn with_state(config: HttpServerConfig, state: Arc<AppState>) -> Self {
        let router = Self::build_router(state);
        Self { config, router }
    }

    /// Build the full router.
    ///
    /// Every response, errors included, carries
    /// `access-control-allow-origin: *`.
    pub fn build_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/v1/*path", get(get_v1).put(put_v1).options(options_v1))
            .fallback(fallback_handler)
            .layer(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .with_state(state)
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until ctrl-c.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid listen address '{}': {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?.to_string();
        log_event_with_fields(Event::Serving, &[("addr", bound.as_str())]);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;

        log_event_with_fields(Event::ShutdownComplete, &[("addr", bound.as_str())]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SyntheticRenderer;
    use crate::storage::MemoryStore;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn router() -> Router {
        let state = AppState::open(Arc::new(MemoryStore::new()), Arc::new(SyntheticRenderer)).unwrap();
        HttpServer::build_router(Arc::new(state))
    }

    #[test]
    fn test_socket_addr() {
        let state = AppState::open(Arc::new(MemoryStore::new()), Arc::new(SyntheticRenderer)).unwrap();
        let server = HttpServer::with_state(HttpServerConfig::with_port(8080), Arc::new(state));
        assert_eq!(server.socket_addr(), "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_unknown_route_is_problem() {
        let response = router()
            .oneshot(Request::get("/v2/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_options_answers_preflight() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/v1/en.wikipedia.test.local/pages/Foobar/html/624484477")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "GET");
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "accept, content-type"
        );
    }
}
