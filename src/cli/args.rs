//! CLI argument definitions using clap
//!
//! Commands:
//! - revstore init --config <path>
//! - revstore serve --config <path> [--port N] [--offline]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// revstore - a revision-addressable content store that renders on miss
#[derive(Parser, Debug)]
#[command(name = "revstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create the data directory and an empty store log
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./revstore.json")]
        config: PathBuf,
    },

    /// Open the store and serve HTTP
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./revstore.json")]
        config: PathBuf,

        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,

        /// Never call the renderer; serve stored content only
        #[arg(long)]
        offline: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
