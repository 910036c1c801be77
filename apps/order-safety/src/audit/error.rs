//! Audit trail errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from writing the audit trail.
///
/// Verification never returns these; it reports findings in an
/// [`IntegrityReport`](super::IntegrityReport) instead.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Creating, appending to, or syncing an audit file failed.
    #[error("audit I/O error at '{}': {source}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("failed to serialize audit record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The existing day file could not be read to continue its chain.
    #[error("cannot continue audit chain from '{}': {reason}", .path.display())]
    ChainRecovery {
        /// Day file whose tail could not be read.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}
