//! Idempotency store and audit trail locations.

use serde::{Deserialize, Serialize};

use crate::audit::AuditSettings;
use crate::idempotency::DEFAULT_TTL_DAYS;

/// Idempotency store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Store file.
    #[serde(default = "default_idempotency_path")]
    pub path: String,
    /// Record lifetime in days.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            path: default_idempotency_path(),
            ttl_days: default_ttl_days(),
        }
    }
}

fn default_idempotency_path() -> String {
    "state/idempotency.json".to_string()
}

const fn default_ttl_days() -> u32 {
    DEFAULT_TTL_DAYS
}

/// Audit trail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory for audit files.
    #[serde(default = "default_audit_dir")]
    pub dir: String,
    /// Fail instead of restarting the chain when history is unreadable.
    #[serde(default)]
    pub strict_chain_recovery: bool,
    /// Additional payload keys to redact.
    #[serde(default)]
    pub extra_redact_keys: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: default_audit_dir(),
            strict_chain_recovery: false,
            extra_redact_keys: Vec::new(),
        }
    }
}

impl AuditConfig {
    /// Logger settings.
    #[must_use]
    pub fn to_settings(&self) -> AuditSettings {
        AuditSettings {
            strict_chain_recovery: self.strict_chain_recovery,
            extra_redact_keys: self.extra_redact_keys.clone(),
        }
    }
}

fn default_audit_dir() -> String {
    "logs/audit".to_string()
}
