//! Error types for the tabload pipeline.
//!
//! Fatal conditions are returned as `Err(PipelineError)`. Conditions the
//! pipeline recovers from (schema creation refused, a batch rejected, the
//! staged file missing at load time) are reported as values instead; see
//! `schema::SchemaOutcome` and `loader::LoadReport`.

use std::path::PathBuf;

/// Top-level error type for transform and load operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Malformed table {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Extraction from {url} failed: {message}")]
    Extract { url: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by a missing input file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }
}

/// Errors raised by a store handle.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {message}")]
    Request { message: String },

    #[error("store responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode payload: {message}")]
    Encode { message: String },

    #[error("invalid store url '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request {
            message: e.to_string(),
        }
    }
}
