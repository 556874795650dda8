//! # `/v1` routes
//!
//! One wildcard route carries every `/v1` request; the path is decoded here
//! segment by segment so that percent-encoded `/` in titles survives.
//!
//! | Path                                   | GET              | PUT           |
//! |----------------------------------------|------------------|---------------|
//! | `/v1/{domain}[/]`                      | list buckets     | create domain |
//! | `/v1/{domain}/{bucket}[/]`             | list titles      | create bucket |
//! | `/v1/{d}/{b}/{title}/{property}/`      | list revisions   |               |
//! | `/v1/{d}/{b}/{title}/{property}[/{id}]`| item (render)    | store item    |
//!
//! Key-value buckets drop the property segment.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::problem::{ApiError, ProblemKind};
use super::state::AppState;
use crate::identity::Selector;
use crate::items::{ItemKey, Snapshot};
use crate::observability::{log_event_with_fields, Event};
use crate::registry::{parse_bucket_spec, BucketRecord, PropertySpec};

const V1_PREFIX: &str = "/v1/";

/// A decoded `/v1/...` path
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct V1Path {
    pub segments: Vec<String>,
    pub trailing_slash: bool,
}

pub(crate) fn parse_v1_path(path: &str) -> Result<V1Path, ApiError> {
    let rest = path
        .strip_prefix(V1_PREFIX)
        .ok_or_else(|| ApiError::not_found(format!("no route for {}", path)))?;
    let trailing_slash = rest.ends_with('/');
    let trimmed = rest.strip_suffix('/').unwrap_or(rest);
    if trimmed.is_empty() {
        return Err(ApiError::not_found("no domain in path"));
    }

    let mut segments = Vec::new();
    for raw in trimmed.split('/') {
        if raw.is_empty() {
            return Err(ApiError::not_found(format!("empty segment in {}", path)));
        }
        let decoded = urlencoding::decode(raw)
            .map_err(|_| ApiError::not_found(format!("undecodable segment '{}'", raw)))?;
        segments.push(decoded.into_owned());
    }

    Ok(V1Path {
        segments,
        trailing_slash,
    })
}

/// An item path resolved against its bucket's kind
#[derive(Debug)]
struct ItemAddress {
    item: ItemKey,
    property: Option<&'static PropertySpec>,
    /// Raw revision-or-token segment; `None` means latest
    revision: Option<String>,
    /// `.../{property}/`: list revisions instead of fetching
    listing: bool,
}

fn address_item(
    bucket: &BucketRecord,
    rest: &[String],
    trailing_slash: bool,
) -> Result<ItemAddress, ApiError> {
    let capabilities = bucket.kind.capabilities();
    let (title, property, revision) = match (capabilities.has_properties(), rest) {
        (true, [title, property]) => (title, Some(property), None),
        (true, [title, property, revision]) => (title, Some(property), Some(revision)),
        (false, [key]) => (key, None, None),
        (false, [key, revision]) => (key, None, Some(revision)),
        _ => {
            return Err(ApiError::not_found(format!(
                "no {} item at {}",
                bucket.kind,
                rest.join("/")
            )))
        }
    };
    if trailing_slash && revision.is_some() {
        return Err(ApiError::not_found("nothing below a revision"));
    }

    let spec = match property {
        Some(name) => Some(capabilities.property(name).ok_or_else(|| {
            ApiError::not_found(format!("{} buckets have no property '{}'", bucket.kind, name))
        })?),
        None => None,
    };

    Ok(ItemAddress {
        item: ItemKey::new(
            &bucket.domain,
            &bucket.name,
            title,
            property.map(String::as_str),
        ),
        property: spec,
        revision: revision.cloned(),
        listing: trailing_slash,
    })
}

/// `cache-control: no-cache` or `pragma: no-cache`
pub(crate) fn wants_fresh(headers: &HeaderMap) -> bool {
    let has_no_cache = |name: HeaderName| {
        headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
    };
    has_no_cache(header::CACHE_CONTROL) || has_no_cache(header::PRAGMA)
}

#[derive(Serialize)]
struct Listing<T: Serialize> {
    items: Vec<T>,
}

fn listing<T: Serialize>(items: Vec<T>) -> Response {
    Json(Listing { items }).into_response()
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::new(ProblemKind::Internal, format!("unencodable header '{}'", value)))
}

fn snapshot_response(snapshot: &Snapshot) -> Result<Response, ApiError> {
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, header_value(&snapshot.content_type)?),
            (header::ETAG, header_value(&snapshot.token.to_string())?),
        ],
        snapshot.body.clone(),
    )
        .into_response())
}

// ==================
// GET
// ==================

pub(crate) async fn get_v1(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.metrics.increment_requests();
    let path = parse_v1_path(uri.path())?;

    match path.segments.as_slice() {
        [domain] => list_buckets(&state, domain),
        [domain, bucket] => list_titles(&state, domain, bucket),
        [domain, bucket, rest @ ..] => {
            get_item(&state, domain, bucket, rest, path.trailing_slash, &headers).await
        }
        [] => Err(ApiError::not_found("no domain in path")),
    }
}

fn list_buckets(state: &AppState, domain: &str) -> Result<Response, ApiError> {
    let names: Vec<String> = state
        .registry
        .list_buckets(domain)?
        .into_iter()
        .map(|bucket| bucket.name)
        .collect();
    Ok(listing(names))
}

fn list_titles(state: &AppState, domain: &str, bucket: &str) -> Result<Response, ApiError> {
    state.registry.resolve(domain, bucket)?;
    let titles = state.pipeline.items().list_titles(domain, bucket)?;
    Ok(listing(titles))
}

async fn get_item(
    state: &AppState,
    domain: &str,
    bucket: &str,
    rest: &[String],
    trailing_slash: bool,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let bucket = state.registry.resolve(domain, bucket)?;
    let address = address_item(&bucket, rest, trailing_slash)?;

    if address.listing {
        let revisions = state.pipeline.items().list_revisions(&address.item)?;
        return Ok(listing(revisions));
    }

    let selector = Selector::from_segment(address.revision.as_deref())?;
    let snapshot = state
        .pipeline
        .get(&bucket, &address.item, &selector, wants_fresh(headers))
        .await?;
    snapshot_response(&snapshot)
}

// ==================
// PUT
// ==================

pub(crate) async fn put_v1(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.metrics.increment_requests();
    let path = parse_v1_path(uri.path())?;

    // Every write ends in an fsync; keep it off the async workers.
    tokio::task::spawn_blocking(move || put_blocking(&state, &path, &headers, body))
        .await
        .map_err(|e| ApiError::new(ProblemKind::Internal, format!("write task failed: {}", e)))?
}

fn put_blocking(
    state: &AppState,
    path: &V1Path,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    match path.segments.as_slice() {
        [domain] => create_domain(state, domain),
        [domain, bucket] => create_bucket(state, domain, bucket, &body),
        [domain, bucket, rest @ ..] => {
            put_item(state, domain, bucket, rest, path.trailing_slash, headers, body)
        }
        [] => Err(ApiError::not_found("no domain in path")),
    }
}

fn create_domain(state: &AppState, domain: &str) -> Result<Response, ApiError> {
    if state.registry.create_domain(domain)?.is_new() {
        log_event_with_fields(Event::DomainCreated, &[("domain", domain)]);
    }
    Ok(StatusCode::CREATED.into_response())
}

fn create_bucket(
    state: &AppState,
    domain: &str,
    bucket: &str,
    body: &[u8],
) -> Result<Response, ApiError> {
    // Unknown domains are a 404 whatever the body says
    state.registry.domain(domain)?;
    let kind = parse_bucket_spec(body)?;
    if state.registry.create_bucket(domain, bucket, kind)?.is_new() {
        log_event_with_fields(
            Event::BucketCreated,
            &[("bucket", bucket), ("domain", domain), ("type", kind.as_str())],
        );
    }
    Ok(StatusCode::CREATED.into_response())
}

fn put_item(
    state: &AppState,
    domain: &str,
    bucket: &str,
    rest: &[String],
    trailing_slash: bool,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let bucket = state.registry.resolve(domain, bucket)?;
    let address = address_item(&bucket, rest, trailing_slash)?;
    if address.listing {
        return Err(ApiError::invalid_request("PUT needs a revision or token"));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::invalid_request("missing content-type"))?;
    if let Some(property) = address.property {
        if !property.accepts_content_type(content_type) {
            return Err(ApiError::invalid_request(format!(
                "content-type '{}' is not accepted for {}",
                content_type, property.name
            )));
        }
    }

    let selector = Selector::from_segment(address.revision.as_deref())?;
    let outcome = state
        .pipeline
        .items()
        .put(&address.item, &selector, content_type, body)?;

    let token = outcome.snapshot.token.to_string();
    if outcome.written {
        state.metrics.increment_snapshots_written();
        let item = address.item.to_string();
        log_event_with_fields(
            Event::SnapshotWritten,
            &[("item", item.as_str()), ("token", token.as_str())],
        );
    }

    Ok((StatusCode::CREATED, [(header::ETAG, header_value(&token)?)]).into_response())
}

// ==================
// OPTIONS
// ==================

/// CORS preflight; answered without touching the store.
pub(crate) async fn options_v1() -> Response {
    (
        StatusCode::OK,
        [
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("accept, content-type"),
            ),
        ],
    )
        .into_response()
}
