//! CLI module for revstore
//!
//! Provides the command-line interface for:
//! - init: Create the data directory and store log
//! - serve: Open the store and serve HTTP

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{init, run, run_command, serve};
pub use config::{Config, RendererConfig, RendererMode};
pub use errors::{CliError, CliErrorCode, CliResult};
