//! CLI command implementations
//!
//! - `init` creates the data directory and an empty store log, then prints
//!   a one-line JSON report.
//! - `serve` replays the store, wires the configured renderer and serves
//!   HTTP until ctrl-c.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use super::args::{Cli, Command};
use super::config::{Config, RendererConfig, RendererMode};
use super::errors::{CliError, CliResult};
use crate::http_server::{AppState, HttpServer};
use crate::observability::{log_event, log_event_with_fields, Event};
use crate::render::{HttpRenderer, OfflineRenderer, Renderer, SyntheticRenderer};
use crate::storage::{FileStore, KeyValueStore, LOG_FILE_NAME};

/// Parse arguments and run the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve {
            config,
            port,
            offline,
        } => serve(&config, port, offline),
    }
}

pub fn init(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let report = init_data_dir(&config)?;
    write_report(&mut io::stdout(), &report)
}

pub fn serve(config_path: &Path, port: Option<u16>, offline: bool) -> CliResult<()> {
    log_event(Event::BootStart);

    let mut config = Config::load(config_path)?;
    if let Some(port) = port {
        config.http.port = port;
    }
    if offline {
        config.renderer.mode = RendererMode::Offline;
    }
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("data_dir", config.data_dir.as_str()),
            ("renderer", config.renderer.mode.as_str()),
        ],
    );

    let state = open_state(&config)?;
    let server = HttpServer::with_state(config.http.clone(), Arc::new(state));

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to start runtime: {}", e)))?;
    runtime
        .block_on(server.start())
        .map_err(|e| CliError::boot_failed(format!("Server error: {}", e)))
}

/// Create `data_dir` and its store log. Refuses a directory that already
/// holds one.
fn init_data_dir(config: &Config) -> CliResult<Value> {
    let data_dir = config.data_path();
    if is_initialized(data_dir) {
        return Err(CliError::already_initialized(&config.data_dir));
    }

    fs::create_dir_all(data_dir).map_err(|e| {
        CliError::io_error(format!("Failed to create {}: {}", data_dir.display(), e))
    })?;
    FileStore::open(data_dir)?;

    Ok(json!({
        "initialized": true,
        "data_dir": config.data_dir,
    }))
}

/// Replay the store log and build the shared server state.
fn open_state(config: &Config) -> CliResult<AppState> {
    let data_dir = config.data_path();
    if !is_initialized(data_dir) {
        return Err(CliError::not_initialized(&config.data_dir));
    }

    let store = match FileStore::open(data_dir) {
        Ok(store) => store,
        Err(e) => {
            let reason = e.to_string();
            log_event_with_fields(
                Event::StoreOpenFailed,
                &[
                    ("data_dir", config.data_dir.as_str()),
                    ("code", e.code().code()),
                    ("reason", reason.as_str()),
                ],
            );
            return Err(e.into());
        }
    };

    let keys = store.key_count().to_string();
    let bytes = store.log_size().to_string();
    let store: Arc<dyn KeyValueStore> = Arc::new(store);

    let renderer = build_renderer(&config.renderer)?;
    let state = AppState::open(store, renderer)
        .map_err(|e| CliError::boot_failed(e.to_string()))?;

    log_event_with_fields(
        Event::StoreOpened,
        &[("keys", keys.as_str()), ("log_bytes", bytes.as_str())],
    );
    Ok(state)
}

fn build_renderer(config: &RendererConfig) -> CliResult<Arc<dyn Renderer>> {
    let renderer: Arc<dyn Renderer> = match config.mode {
        RendererMode::Http => Arc::new(
            HttpRenderer::new(&config.base_url, config.timeout())
                .map_err(|e| CliError::config_error(e.to_string()))?,
        ),
        RendererMode::Synthetic => Arc::new(SyntheticRenderer),
        RendererMode::Offline => Arc::new(OfflineRenderer),
    };
    Ok(renderer)
}

fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join(LOG_FILE_NAME).exists()
}

/// Write `{"status": "ok", "data": ...}` as one line.
fn write_report(out: &mut impl Write, data: &Value) -> CliResult<()> {
    let response = json!({
        "status": "ok",
        "data": data,
    });
    serde_json::to_writer(&mut *out, &response)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
