//! Idempotency store errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the idempotency store.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// Reading, writing, renaming, or locking the store file failed.
    #[error("idempotency store I/O error at '{}': {source}", .path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The store file exists but is not a valid snapshot.
    #[error("idempotency file '{}' is corrupt: {source}", .path.display())]
    Corrupt {
        /// Store file.
        path: PathBuf,
        /// Parse error.
        source: serde_json::Error,
    },

    /// Serializing the snapshot failed.
    #[error("failed to serialize idempotency snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The intent is already bound to another client order id.
    #[error("intent '{key}' is already bound to client order id '{existing}'")]
    Conflict {
        /// Intent key.
        key: String,
        /// Stored id.
        existing: String,
    },
}
