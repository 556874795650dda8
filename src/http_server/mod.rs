//! # HTTP surface
//!
//! Axum router over the registry and render pipeline.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/metrics` - Counters as JSON
//! - `/v1/*` - Domains, buckets and items

pub mod config;
pub mod problem;
mod routes;
pub mod server;
mod state;

pub use config::HttpServerConfig;
pub use problem::{ApiError, ProblemKind, PROBLEM_CONTENT_TYPE};
pub use server::HttpServer;
pub use state::{AppState, StartupError};
