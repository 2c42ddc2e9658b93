//! Crate-wide error types

use std::path::PathBuf;
use thiserror::Error;

/// Error type for report export operations
#[derive(Debug, Error)]
pub enum ExportError {
    /// Configuration file missing, unreadable, or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report service transport or protocol failure
    #[error("Report service error: {0}")]
    Api(String),

    /// Report file could not be parsed; no rows from it are committed
    #[error("Failed to parse {file}: {message}")]
    Parse { file: PathBuf, message: String },

    /// Database connection or statement failure
    #[error("Database error: {0}")]
    Database(String),

    /// Local filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report export operations
pub type ExportResult<T> = Result<T, ExportError>;
