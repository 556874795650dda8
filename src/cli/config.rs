//! Configuration file
//!
//! ```json
//! {
//!   "data_dir": "./data",
//!   "http": { "host": "0.0.0.0", "port": 7231 },
//!   "renderer": { "mode": "http", "base_url": "http://localhost:8000", "timeout_ms": 20000 }
//! }
//! ```
//!
//! Only `data_dir` is required.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::http_server::HttpServerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererMode {
    /// Parsoid-style HTTP backend
    Http,
    /// Deterministic local output
    Synthetic,
    /// Serve stored content only
    Offline,
}

impl RendererMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererMode::Http => "http",
            RendererMode::Synthetic => "synthetic",
            RendererMode::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_mode")]
    pub mode: RendererMode,

    /// Base URL of the backend (http mode)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-render timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_mode() -> RendererMode {
    RendererMode::Http
}
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RendererConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `store.log` (required)
    pub data_dir: String,

    #[serde(default)]
    pub http: HttpServerConfig,

    #[serde(default)]
    pub renderer: RendererConfig,
}

impl Config {
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }
        if self.http.host.trim().is_empty() {
            return Err(CliError::config_error("http.host must not be empty"));
        }
        if self.renderer.timeout_ms == 0 {
            return Err(CliError::config_error("renderer.timeout_ms must be > 0"));
        }
        if self.renderer.mode == RendererMode::Http && self.renderer.base_url.trim().is_empty() {
            return Err(CliError::config_error(
                "renderer.base_url is required when renderer.mode is 'http'",
            ));
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }
}
