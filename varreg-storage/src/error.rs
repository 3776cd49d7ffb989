use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("A prior batch failed, writes are rejected until the batch scope exits: {0}")]
    BatchAborted(String),

    #[error("Timed out after {0:?} waiting for space in the pending batch queue")]
    BackpressureTimeout(Duration),

    #[error("Batch state error: {0}")]
    InvalidBatchState(&'static str),

    #[error("Invalid search range: end ({end}) must be greater than start ({start})")]
    InvalidRange { start: u64, end: u64 },

    #[error("Malformed stored object {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
