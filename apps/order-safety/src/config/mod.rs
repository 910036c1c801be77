//! Configuration loading, validation, and environment variable interpolation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use order_safety::config::load_config;
//!
//! // `ORDER_SAFETY_CONFIG`, else config.yaml
//! let config = load_config(None)?;
//!
//! let limiter = RateLimiter::new(config.rate_limit.to_settings())?;
//! ```

mod limits;
mod observability;
mod orders;
mod persistence;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use limits::{RateLimitConfig, RetryConfig};
pub use observability::{LogFormat, LoggingConfig, ObservabilityConfig};
pub use orders::{ClientIdConfig, ProtectiveConfig};
pub use persistence::{AuditConfig, IdempotencyConfig};

use crate::idempotency::validate_max_len;
use crate::models::Environment;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "ORDER_SAFETY_CONFIG";

/// Config file used when nothing else is specified.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deployment environment.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Exchange rate budgets (required).
    pub rate_limit: RateLimitConfig,
    /// Exchange retry behaviour.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Idempotency store.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// Audit trail.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Client order ids.
    #[serde(default)]
    pub client_id: ClientIdConfig,
    /// Protective order distances.
    #[serde(default)]
    pub protective: ProtectiveConfig,
    /// Logging.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Which exchange environment this process trades against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// `TESTNET` (default) or `LIVE`. Anything else fails to parse.
    #[serde(default)]
    pub mode: Environment,
}

// ============================================
// Configuration Loading
// ============================================

/// Config path: explicit argument, then `ORDER_SAFETY_CONFIG`, then `config.yaml`.
#[must_use]
pub fn resolve_config_path(path: Option<&str>) -> String {
    path.map(str::to_string)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.is_empty()))
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = resolve_config_path(path);

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let rl = &config.rate_limit;
    if rl.weight_limit_per_minute == 0 {
        return Err(ConfigError::ValidationError(
            "rate_limit.weight_limit_per_minute must be positive".to_string(),
        ));
    }

    if rl.request_limit_per_second == 0 {
        return Err(ConfigError::ValidationError(
            "rate_limit.request_limit_per_second must be positive".to_string(),
        ));
    }

    if !(rl.buffer_pct > 0.0 && rl.buffer_pct <= 1.0) {
        return Err(ConfigError::ValidationError(
            "rate_limit.buffer_pct must be in (0.0, 1.0]".to_string(),
        ));
    }

    if rl.to_settings().weight_budget() == 0 {
        return Err(ConfigError::ValidationError(
            "rate_limit.weight_limit_per_minute * buffer_pct must be at least 1".to_string(),
        ));
    }

    if let Err(e) = validate_max_len(config.client_id.max_len) {
        return Err(ConfigError::ValidationError(format!("client_id.max_len: {e}")));
    }

    if config.idempotency.ttl_days == 0 {
        return Err(ConfigError::ValidationError(
            "idempotency.ttl_days must be positive".to_string(),
        ));
    }

    if config.idempotency.path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "idempotency.path must not be empty".to_string(),
        ));
    }

    if config.audit.dir.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "audit.dir must not be empty".to_string(),
        ));
    }

    let retry = &config.retry;
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return Err(ConfigError::ValidationError(
            "retry.jitter_factor must be between 0.0 and 1.0".to_string(),
        ));
    }

    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "retry.backoff_multiplier must be at least 1.0".to_string(),
        ));
    }

    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ConfigError::ValidationError(
            "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const MINIMAL: &str = r"
rate_limit:
  weight_limit_per_minute: 1200
  request_limit_per_second: 10
";

    #[test]
    fn test_load_minimal_config() {
        let config = match load_config_from_string(MINIMAL) {
            Ok(c) => c,
            Err(e) => panic!("should load minimal config: {e}"),
        };

        assert_eq!(config.environment.mode, Environment::Testnet);
        assert!((config.rate_limit.buffer_pct - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.rate_limit.acquire_timeout_ms, Some(30_000));
        assert_eq!(config.idempotency.ttl_days, 7);
        assert_eq!(config.client_id.max_len, 36);
        assert_eq!(config.protective.min_ticks, 2);
        assert_eq!(config.protective.min_bps, dec!(5));
        assert!(!config.audit.strict_chain_recovery);
        assert_eq!(config.observability.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_rate_limit_is_fatal() {
        let result = load_config_from_string("environment:\n  mode: LIVE\n");
        let Err(err) = result else {
            panic!("expected error for missing rate_limit");
        };
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_request_limit_is_fatal() {
        let yaml = "rate_limit:\n  weight_limit_per_minute: 1200\n";
        assert!(matches!(
            load_config_from_string(yaml),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "mode: ${ORDER_SAFETY_TEST_NONEXISTENT_VAR:-LIVE}";
        assert_eq!(interpolate_env_vars(input), "mode: LIVE");
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "dir: ${ORDER_SAFETY_TEST_UNLIKELY_TO_EXIST}";
        assert_eq!(interpolate_env_vars(input), "dir: ");
    }

    #[test]
    #[expect(clippy::literal_string_with_formatting_args)] // ${...} is env var syntax, not format args
    fn test_env_var_with_default_uses_existing() {
        let result = interpolate_env_vars("path: ${PATH:-default}");
        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn test_validation_buffer_pct() {
        let yaml = r"
rate_limit:
  weight_limit_per_minute: 1200
  request_limit_per_second: 10
  buffer_pct: 1.5
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for buffer_pct");
        };
        assert!(err.to_string().contains("buffer_pct"));
    }

    #[test]
    fn test_validation_zero_limit() {
        let yaml = r"
rate_limit:
  weight_limit_per_minute: 0
  request_limit_per_second: 10
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for zero weight limit");
        };
        assert!(err.to_string().contains("weight_limit_per_minute"));
    }

    #[test]
    fn test_validation_client_id_too_short() {
        let yaml = format!("{MINIMAL}client_id:\n  max_len: 8\n");
        let Err(err) = load_config_from_string(&yaml) else {
            panic!("expected error for max_len");
        };
        assert!(err.to_string().contains("client_id.max_len"));
    }

    #[test]
    fn test_validation_invalid_environment_mode() {
        let yaml = format!("{MINIMAL}environment:\n  mode: PAPER\n");
        assert!(load_config_from_string(&yaml).is_err());
    }

    #[test]
    fn test_validation_jitter_factor() {
        let yaml = format!("{MINIMAL}retry:\n  jitter_factor: 2.0\n");
        let Err(err) = load_config_from_string(&yaml) else {
            panic!("expected error for jitter_factor");
        };
        assert!(err.to_string().contains("jitter_factor"));
    }

    #[test]
    fn test_full_config_parse() {
        let yaml = r#"
environment:
  mode: LIVE

rate_limit:
  weight_limit_per_minute: 2400
  request_limit_per_second: 20
  buffer_pct: 0.75
  acquire_timeout_ms: null

retry:
  max_attempts: 5
  initial_backoff_ms: 100
  max_backoff_ms: 5000
  backoff_multiplier: 1.5
  jitter_factor: 0.1

idempotency:
  path: "/var/lib/order-safety/idempotency.json"
  ttl_days: 14

audit:
  dir: "/var/log/order-safety"
  strict_chain_recovery: true
  extra_redact_keys: ["account_id"]

client_id:
  max_len: 32

protective:
  min_ticks: 3
  min_bps: "7.5"
  allow_qty_increase: true

observability:
  logging:
    level: "debug"
    format: "pretty"
"#;

        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load full config: {e}"),
        };

        assert_eq!(config.environment.mode, Environment::Live);
        let limiter = config.rate_limit.to_settings();
        assert_eq!(limiter.weight_budget(), 1800);
        assert!(limiter.acquire_timeout.is_none());

        let policy = config.retry.to_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.max_backoff, Duration::from_secs(5));

        assert_eq!(config.idempotency.ttl_days, 14);
        assert!(config.audit.to_settings().strict_chain_recovery);
        assert_eq!(config.audit.extra_redact_keys, vec!["account_id"]);
        assert_eq!(config.client_id.factory().unwrap().max_len(), 32);
        assert_eq!(config.protective.to_settings().min_bps, dec!(7.5));
        assert_eq!(config.observability.logging.level, "debug");
        assert_eq!(config.observability.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let yaml = format!("{MINIMAL}observability:\n  logging:\n    format: xml\n");
        assert!(matches!(load_config_from_string(&yaml), Err(ConfigError::ParseError(_))));
    }
}
