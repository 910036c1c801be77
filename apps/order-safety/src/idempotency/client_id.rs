//! Deterministic client order ids.
//!
//! ```text
//! {ENV}-{STRATEGY}-{SYMBOL}-{SIDE}-{unix_seconds}-{sha256(intent_key)[..6]}
//! ```
//!
//! Components are uppercased with `/` → `SLASH` and `-` → `DASH`, so the `-`
//! separator is unambiguous; anything else outside `[A-Z0-9_]` becomes `_`.
//! Ids longer than `max_len` are cut, stripped of a trailing `-`, and
//! suffixed with 8 hex chars of the SHA-256 of the full id.

use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Environment, OrderIntent, OrderSide};

/// Exchange limit for client order ids.
pub const DEFAULT_CLIENT_ID_MAX_LEN: usize = 36;

/// Hex chars of the intent hash embedded in every id.
const INTENT_HASH_LEN: usize = 6;

/// Hex chars of the overflow suffix.
const OVERFLOW_HASH_LEN: usize = 8;

/// Smallest `max_len` that still leaves one char before `-{suffix}`.
pub const MIN_CLIENT_ID_LEN: usize = OVERFLOW_HASH_LEN + 2;

const SEPARATOR: char = '-';

/// Client id configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientIdError {
    /// `max_len` cannot fit the overflow hash suffix.
    #[error(
        "client order id max_len {max_len} is too small for the hash suffix (minimum {MIN_CLIENT_ID_LEN})"
    )]
    MaxLenTooSmall {
        /// Configured maximum.
        max_len: usize,
    },
}

/// Validate a configured id length.
pub const fn validate_max_len(max_len: usize) -> Result<(), ClientIdError> {
    if max_len < MIN_CLIENT_ID_LEN {
        return Err(ClientIdError::MaxLenTooSmall { max_len });
    }
    Ok(())
}

/// Sanitize one id component.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    raw.to_uppercase()
        .replace('/', "SLASH")
        .replace('-', "DASH")
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Derive a client order id.
///
/// Stable for retries of the same `intent_key` within one second; different
/// across intents and across seconds. `ts_ms` defaults to now.
pub fn make_client_id(
    env: Environment,
    strategy: &str,
    symbol: &str,
    side: OrderSide,
    intent_key: &str,
    ts_ms: Option<i64>,
    max_len: usize,
) -> Result<String, ClientIdError> {
    validate_max_len(max_len)?;
    Ok(assemble(env, strategy, symbol, side, intent_key, ts_ms, max_len))
}

fn assemble(
    env: Environment,
    strategy: &str,
    symbol: &str,
    side: OrderSide,
    intent_key: &str,
    ts_ms: Option<i64>,
    max_len: usize,
) -> String {
    let ts_ms = ts_ms.unwrap_or_else(|| Utc::now().timestamp_millis());
    let bucket = ts_ms.div_euclid(1000);
    let intent_hash = sha256_hex(intent_key);

    let full = [
        sanitize_component(env.slug()),
        sanitize_component(strategy),
        sanitize_component(symbol),
        sanitize_component(side.as_str()),
        bucket.to_string(),
        intent_hash[..INTENT_HASH_LEN].to_string(),
    ]
    .join(&SEPARATOR.to_string());

    if full.len() <= max_len {
        return full;
    }

    let suffix = &sha256_hex(&full)[..OVERFLOW_HASH_LEN];
    let keep = max_len - OVERFLOW_HASH_LEN - 1;
    // A cut right after a separator must not double it
    let head = full[..keep].trim_end_matches(SEPARATOR);
    format!("{head}{SEPARATOR}{suffix}")
}

/// Client id factory bound to a validated maximum length.
#[derive(Debug, Clone, Copy)]
pub struct ClientOrderIdFactory {
    max_len: usize,
}

impl Default for ClientOrderIdFactory {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_CLIENT_ID_MAX_LEN,
        }
    }
}

impl ClientOrderIdFactory {
    /// Create a factory; fails eagerly when `max_len` is too small.
    pub fn new(max_len: usize) -> Result<Self, ClientIdError> {
        validate_max_len(max_len)?;
        Ok(Self { max_len })
    }

    /// Configured maximum length.
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Derive the id for an order intent.
    #[must_use]
    pub fn client_id_for(&self, intent: &OrderIntent, ts_ms: Option<i64>) -> String {
        assemble(
            intent.env,
            &intent.strategy,
            &intent.symbol,
            intent.side,
            &intent.intent_key,
            ts_ms,
            self.max_len,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: i64 = 1_700_000_000_250;

    fn id(intent_key: &str, ts_ms: i64, max_len: usize) -> String {
        make_client_id(
            Environment::Live,
            "trend-follow",
            "BTC/USDT",
            OrderSide::Buy,
            intent_key,
            Some(ts_ms),
            max_len,
        )
        .unwrap()
    }

    #[test]
    fn test_sanitize_preserves_separators_semantically() {
        assert_eq!(sanitize_component("btc/usdt"), "BTCSLASHUSDT");
        assert_eq!(sanitize_component("mean-rev"), "MEANDASHREV");
        assert_eq!(sanitize_component("a.b c"), "A_B_C");
        assert_eq!(sanitize_component("x_1"), "X_1");
    }

    #[test]
    fn test_same_second_same_id() {
        assert_eq!(id("entry:1", TS, 64), id("entry:1", TS + 700, 64));
        assert_eq!(id("entry:1", TS, 36), id("entry:1", TS + 700, 36));
    }

    #[test]
    fn test_next_second_differs() {
        assert_ne!(id("entry:1", TS, 64), id("entry:1", TS + 1000, 64));
        assert_ne!(id("entry:1", TS, 36), id("entry:1", TS + 1000, 36));
    }

    #[test]
    fn test_different_intents_differ() {
        assert_ne!(id("entry:1", TS, 64), id("entry:2", TS, 64));
        assert_ne!(id("entry:1", TS, 36), id("entry:2", TS, 36));
    }

    #[test]
    fn test_untruncated_layout() {
        let full = id("entry:1", TS, 128);
        let parts: Vec<&str> = full.split('-').collect();
        assert_eq!(
            parts[..5],
            ["LIVE", "TRENDDASHFOLLOW", "BTCSLASHUSDT", "BUY", "1700000000"]
        );
        assert_eq!(parts[5].len(), INTENT_HASH_LEN);
    }

    #[test]
    fn test_truncated_ids_respect_max_len() {
        for max_len in [MIN_CLIENT_ID_LEN, 16, 20, 32, DEFAULT_CLIENT_ID_MAX_LEN] {
            let value = id("a fairly long intent key", TS, max_len);
            assert!(value.len() <= max_len, "{value} longer than {max_len}");
        }
        assert_eq!(id("k", TS, DEFAULT_CLIENT_ID_MAX_LEN).len(), DEFAULT_CLIENT_ID_MAX_LEN);
    }

    #[test]
    fn test_cut_after_separator_is_not_doubled() {
        // "TESTNET-S-BTCSLASHUSDT-BUY-" is exactly the kept prefix at 36
        let value = make_client_id(
            Environment::Testnet,
            "s",
            "BTC/USDT",
            OrderSide::Buy,
            "entry:1",
            Some(TS),
            DEFAULT_CLIENT_ID_MAX_LEN,
        )
        .unwrap();

        assert!(value.starts_with("TESTNET-S-BTCSLASHUSDT-BUY-"));
        assert!(!value.contains("--"), "{value}");
        assert!(value.len() < DEFAULT_CLIENT_ID_MAX_LEN);
    }

    #[test]
    fn test_truncation_never_leaves_empty_components() {
        for max_len in MIN_CLIENT_ID_LEN..=64 {
            let value = id("entry:42", TS, max_len);
            assert!(!value.contains("--"), "{value} at max_len {max_len}");
            assert!(!value.starts_with('-') && !value.ends_with('-'));
        }
    }

    #[test]
    fn test_ids_are_exchange_legal() {
        let value = id("k", TS, DEFAULT_CLIENT_ID_MAX_LEN);
        assert!(
            value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        );
    }

    #[test]
    fn test_max_len_too_small_is_rejected() {
        let result = make_client_id(
            Environment::Testnet,
            "s",
            "X",
            OrderSide::Sell,
            "k",
            Some(TS),
            MIN_CLIENT_ID_LEN - 1,
        );
        assert_eq!(
            result,
            Err(ClientIdError::MaxLenTooSmall {
                max_len: MIN_CLIENT_ID_LEN - 1
            })
        );
        assert!(ClientOrderIdFactory::new(4).is_err());
    }

    #[test]
    fn test_factory_uses_intent_fields() {
        let factory = ClientOrderIdFactory::default();
        let intent = OrderIntent::market(
            Environment::Live,
            "trend-follow",
            "BTC/USDT",
            OrderSide::Buy,
            rust_decimal::Decimal::ONE,
            "entry:1",
        );
        assert_eq!(
            factory.client_id_for(&intent, Some(TS)),
            id("entry:1", TS, DEFAULT_CLIENT_ID_MAX_LEN)
        );
    }
}
