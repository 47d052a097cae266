//! Error types for the sync pipeline.
//!
//! [`SyncError`] is fatal for a run and propagates to the caller; nothing is
//! persisted when it occurs. [`DeliveryError`] and [`ExtractError`] are
//! per-record and get absorbed into the run outcome.

use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures. The run aborts and persisted state is left untouched.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("history file unavailable at {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed copying history from {path}: {source}")]
    SourceCopyFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed reading history snapshot: {0}")]
    SourceQueryFailed(#[source] sqlx::Error),
    #[error("run state database error: {0}")]
    State(#[from] sqlx::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

/// A single record could not be delivered. The record is not marked known.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sink rejected payload with HTTP {status}")]
    Rejected { status: u16 },
}

/// Full-text extraction failed; the pipeline falls back to the raw label.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported locator scheme: {0}")]
    UnsupportedScheme(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("fetch returned HTTP {0}")]
    Status(u16),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}
