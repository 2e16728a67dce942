//! Error types for the continuous query index.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by index construction, registration and reporting.
#[derive(Error, Debug)]
pub enum FastError {
    /// A structural invariant of the textual index was violated.
    ///
    /// Aborts the single registration call that hit it; the index stays usable.
    #[error("Invalid index state: {0}")]
    InvalidState(String),

    /// Rejected configuration (granularity, thresholds, bounds).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rejected query (no keywords, `k == 0`, non-finite geometry).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Report destination is a directory.
    #[error("Invalid output destination: {} is a directory", .0.display())]
    InvalidOutput(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, FastError>;
