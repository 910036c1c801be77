//! Removal of credentials from audit payloads.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Replacement for redacted values.
pub const REDACTED: &str = "***REDACTED***";

/// Keys redacted by default (matched case-insensitively, exact name).
pub const DEFAULT_REDACT_KEYS: &[&str] = &[
    "api_key",
    "apikey",
    "api_secret",
    "secret",
    "secret_key",
    "password",
    "passphrase",
    "token",
    "access_token",
    "refresh_token",
    "private_key",
    "signature",
    "authorization",
];

/// Recursively replaces sensitive values by key name.
#[derive(Debug, Clone)]
pub struct Redactor {
    keys: BTreeSet<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl Redactor {
    /// Default keys plus `extra_keys`.
    pub fn new<I, S>(extra_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = DEFAULT_REDACT_KEYS
            .iter()
            .map(|k| (*k).to_string())
            .chain(extra_keys.into_iter().map(|k| k.as_ref().to_ascii_lowercase()))
            .collect();
        Self { keys }
    }

    /// Whether `key` is sensitive.
    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.keys.contains(&key.to_ascii_lowercase())
    }

    /// Copy of `value` with every sensitive key's value replaced.
    #[must_use]
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = if self.is_sensitive(k) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact(v)
                        };
                        (k.clone(), v)
                    })
                    .collect::<Map<String, Value>>(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            other => other.clone(),
        }
    }
}
