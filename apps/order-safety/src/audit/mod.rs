//! Hash-chained compliance audit trail.
//!
//! Records are appended to per-environment, per-day JSONL files. Each record
//! carries the hash of its predecessor so edits, deletions, and reordering
//! are detected by [`AuditLogger::verify_integrity`].

mod error;
mod logger;
mod record;
mod redact;
mod registry;
mod report;

pub use error::AuditError;
pub use logger::{
    AuditLogger, AuditSettings, DecisionKind, IntegrityIssue, IntegrityReport, OrderEventKind,
    verify_file,
};
pub use record::{AuditLevel, AuditRecord, GENESIS_HASH, canonical_json, chain_hash};
pub use redact::{DEFAULT_REDACT_KEYS, REDACTED, Redactor};
pub use registry::AuditRegistry;
pub use report::DailyReport;
