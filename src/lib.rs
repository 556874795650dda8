//! revstore - a revision-addressable content store
//!
//! Pages and their derived properties are stored per revision and per
//! generation token. A miss on a rendering bucket asks the configured
//! renderer for the content, persists it and serves it.

pub mod cli;
pub mod http_server;
pub mod identity;
pub mod items;
pub mod observability;
pub mod registry;
pub mod render;
pub mod storage;
