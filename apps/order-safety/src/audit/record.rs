//! Hash-chained audit records.
//!
//! `hash = sha256_hex(canonical(record without "hash") || prev_hash)`, where the
//! canonical form is compact JSON with every object's keys in sorted order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// `prev_hash` of the first record in every day file.
pub const GENESIS_HASH: &str = "GENESIS";

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditLevel {
    /// Routine event.
    Info,
    /// Something a reviewer should look at.
    Warning,
    /// A failed operation.
    Error,
    /// A safety limit was breached.
    Critical,
}

impl AuditLevel {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of an audit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// UTC write time, RFC 3339 with milliseconds.
    pub timestamp: String,
    /// Logger session that wrote the record.
    pub session_id: String,
    /// Monotonic per session, starting at 1.
    pub event_id: u64,
    /// Severity.
    pub level: AuditLevel,
    /// Event name, e.g. `ORDER_SUBMITTED`.
    pub event: String,
    /// Redacted payload.
    pub data: Value,
    /// Hash of the previous record, or [`GENESIS_HASH`].
    pub prev_hash: String,
    /// Hash of this record.
    pub hash: String,
}

#[derive(Serialize)]
struct UnhashedRecord<'a> {
    timestamp: &'a str,
    session_id: &'a str,
    event_id: u64,
    level: AuditLevel,
    event: &'a str,
    data: &'a Value,
    prev_hash: &'a str,
}

impl AuditRecord {
    /// Build a record and compute its hash.
    pub fn new(
        timestamp: String,
        session_id: String,
        event_id: u64,
        level: AuditLevel,
        event: String,
        data: Value,
        prev_hash: String,
    ) -> Result<Self, serde_json::Error> {
        let mut record = Self {
            timestamp,
            session_id,
            event_id,
            level,
            event,
            data,
            prev_hash,
            hash: String::new(),
        };
        record.hash = record.compute_hash()?;
        Ok(record)
    }

    /// Recompute the hash from the record's other fields.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let unhashed = serde_json::to_value(UnhashedRecord {
            timestamp: &self.timestamp,
            session_id: &self.session_id,
            event_id: self.event_id,
            level: self.level,
            event: &self.event,
            data: &self.data,
            prev_hash: &self.prev_hash,
        })?;
        Ok(chain_hash(&unhashed, &self.prev_hash))
    }

    /// Serialize as one JSONL line (no trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Compact JSON with sorted object keys.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    // `Value` objects are BTreeMap-backed, so `Display` already sorts keys
    value.to_string()
}

/// `sha256_hex(canonical(unhashed) || prev_hash)`.
#[must_use]
pub fn chain_hash(unhashed: &Value, prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(unhashed).as_bytes());
    hasher.update(prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}
