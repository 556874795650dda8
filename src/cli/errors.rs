//! CLI-specific error types
//!
//! Every CLI error ends the process with exit code 1.

use std::fmt;
use std::io;

use crate::storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file missing, unreadable or invalid
    ConfigError,
    IoError,
    AlreadyInitialized,
    NotInitialized,
    /// Store could not be opened or the server could not start
    BootFailed,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "REVSTORE_CLI_CONFIG_ERROR",
            Self::IoError => "REVSTORE_CLI_IO_ERROR",
            Self::AlreadyInitialized => "REVSTORE_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "REVSTORE_CLI_NOT_INITIALIZED",
            Self::BootFailed => "REVSTORE_CLI_BOOT_FAILED",
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized(data_dir: &str) -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            format!("Data directory '{}' already initialized", data_dir),
        )
    }

    pub fn not_initialized(data_dir: &str) -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            format!(
                "Data directory '{}' not initialized. Run 'revstore init' first.",
                data_dir
            ),
        )
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        Self::boot_failed(format!("Failed to open store: {}", e))
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::config_error("renderer.base_url is required");
        assert_eq!(
            err.to_string(),
            "REVSTORE_CLI_CONFIG_ERROR: renderer.base_url is required"
        );
    }

    #[test]
    fn test_storage_error_is_boot_failure() {
        let err = CliError::from(StorageError::data_corruption("bad checksum"));
        assert_eq!(err.code(), CliErrorCode::BootFailed);
        assert!(err.message().contains("bad checksum"));
    }
}
