//! # Problem responses
//!
//! Every failure leaves the service as `application/problem+json` with
//! `{type, title, status}`; client errors also carry a `detail`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::identity::IdentityError;
use crate::items::ItemError;
use crate::observability::{log_event_with_fields, Event};
use crate::registry::RegistryError;
use crate::render::{PipelineError, RenderError};

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

const TYPE_BASE: &str = "https://restbase.org/errors/";

/// Closed set of problems the API reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    InvalidSpec,
    InvalidRequest,
    NotFound,
    Conflict,
    Upstream,
    Internal,
}

impl ProblemKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ProblemKind::InvalidSpec | ProblemKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ProblemKind::NotFound => StatusCode::NOT_FOUND,
            ProblemKind::Conflict => StatusCode::CONFLICT,
            ProblemKind::Upstream => StatusCode::BAD_GATEWAY,
            ProblemKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ProblemKind::InvalidSpec => "Invalid bucket spec.",
            ProblemKind::InvalidRequest => "Invalid request.",
            ProblemKind::NotFound => "Not found.",
            ProblemKind::Conflict => "Conflict.",
            ProblemKind::Upstream => "Upstream renderer error.",
            ProblemKind::Internal => "Internal error.",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            ProblemKind::InvalidSpec => "invalid_spec",
            ProblemKind::InvalidRequest => "invalid_request",
            ProblemKind::NotFound => "not_found",
            ProblemKind::Conflict => "conflict",
            ProblemKind::Upstream => "upstream",
            ProblemKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
struct ProblemBody<'a> {
    #[serde(rename = "type")]
    problem_type: String,
    title: &'a str,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

/// Error returned by every handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    kind: ProblemKind,
    /// Shown to clients for 4xx only; always logged
    detail: String,
}

impl ApiError {
    pub fn new(kind: ProblemKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ProblemKind::NotFound, detail)
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(ProblemKind::InvalidRequest, detail)
    }

    pub fn kind(&self) -> ProblemKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let client_error = status.is_client_error();

        if client_error {
            log_event_with_fields(
                Event::RequestRejected,
                &[("detail", self.detail.as_str()), ("status", status.as_str())],
            );
        } else {
            log_event_with_fields(
                Event::InternalError,
                &[("detail", self.detail.as_str()), ("status", status.as_str())],
            );
        }

        let body = ProblemBody {
            problem_type: format!("{}{}", TYPE_BASE, self.kind.slug()),
            title: self.kind.title(),
            status: status.as_u16(),
            detail: client_error.then_some(self.detail.as_str()),
        };
        let json = match serde_json::to_vec(&body) {
            Ok(json) => json,
            Err(_) => return status.into_response(),
        };

        (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
            )],
            json,
        )
            .into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let kind = match &err {
            RegistryError::InvalidSpec(_) => ProblemKind::InvalidSpec,
            RegistryError::InvalidName(_) => ProblemKind::InvalidRequest,
            RegistryError::DomainNotFound(_) | RegistryError::BucketNotFound { .. } => {
                ProblemKind::NotFound
            }
            RegistryError::Conflict { .. } => ProblemKind::Conflict,
            RegistryError::Storage(_) => ProblemKind::Internal,
        };
        ApiError::new(kind, err.to_string())
    }
}

impl From<&ItemError> for ApiError {
    fn from(err: &ItemError) -> Self {
        let kind = match err {
            ItemError::NotFound(_) => ProblemKind::NotFound,
            ItemError::InvalidRequest(_) => ProblemKind::InvalidRequest,
            ItemError::Conflict(_) => ProblemKind::Conflict,
            ItemError::Storage(_) => ProblemKind::Internal,
        };
        ApiError::new(kind, err.to_string())
    }
}

impl From<ItemError> for ApiError {
    fn from(err: ItemError) -> Self {
        ApiError::from(&err)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound(detail) => ApiError::not_found(detail),
            PipelineError::Render(RenderError::NotFound(detail)) => ApiError::not_found(detail),
            PipelineError::Render(RenderError::Upstream(detail)) => {
                ApiError::new(ProblemKind::Upstream, detail)
            }
            PipelineError::Item(item) => ApiError::from(item.as_ref()),
        }
    }
}

/// An unparseable revision segment addresses nothing.
impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::not_found(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_client_error_has_detail() {
        let response = ApiError::from(RegistryError::InvalidSpec("missing 'type'".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            PROBLEM_CONTENT_TYPE
        );
        let body = body_json(response).await;
        assert_eq!(body["title"], "Invalid bucket spec.");
        assert_eq!(body["status"], 400);
        assert_eq!(body["type"], "https://restbase.org/errors/invalid_spec");
        assert!(body["detail"].as_str().unwrap().contains("type"));
    }

    #[tokio::test]
    async fn test_server_error_hides_detail() {
        let err = ItemError::Storage(StorageError::data_corruption("checksum mismatch at 42"));
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["title"], "Internal error.");
        assert!(body.get("detail").is_none());
    }

    #[test]
    fn test_render_failures_map_to_status() {
        let upstream = ApiError::from(PipelineError::Render(RenderError::Upstream("timeout".into())));
        assert_eq!(upstream.kind().status(), StatusCode::BAD_GATEWAY);
        let missing = ApiError::from(PipelineError::Render(RenderError::NotFound("gone".into())));
        assert_eq!(missing.kind(), ProblemKind::NotFound);
    }

    #[test]
    fn test_identity_error_is_not_found() {
        let err = ApiError::from(IdentityError::NotARevision("abc".into()));
        assert_eq!(err.kind(), ProblemKind::NotFound);
    }
}
