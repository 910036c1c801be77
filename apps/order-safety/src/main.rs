//! Order Safety maintenance binary.
//!
//! Run once a day (or on demand) per environment:
//!
//! 1. Prune expired idempotency records
//! 2. Verify today's audit hash chain
//! 3. Write the daily audit report
//!
//! Exits non-zero when the audit chain is broken.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-safety
//! ```
//!
//! # Environment Variables
//!
//! - `ORDER_SAFETY_CONFIG`: config file path (default: config.yaml)
//! - `RUST_LOG`: log filter (overrides `observability.logging.level`)

use std::process::ExitCode;

use anyhow::Context;
use order_safety::audit::AuditRegistry;
use order_safety::config::{Config, load_config, resolve_config_path};
use order_safety::idempotency::IdempotencyStore;
use order_safety::telemetry::init_telemetry;
use serde_json::json;

fn main() -> anyhow::Result<ExitCode> {
    load_dotenv();

    let config_path = resolve_config_path(None);
    let config = load_config(Some(&config_path))
        .with_context(|| format!("loading configuration from {config_path}"))?;
    init_telemetry(&config.observability.logging)?;

    tracing::info!(
        environment = %config.environment.mode,
        config = %config_path,
        "Starting order safety maintenance"
    );

    let pruned = prune_idempotency(&config)?;
    let chain_ok = verify_and_report(&config, pruned)?;

    if chain_ok {
        tracing::info!("Maintenance complete");
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Audit chain verification failed");
        Ok(ExitCode::FAILURE)
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

fn prune_idempotency(config: &Config) -> anyhow::Result<usize> {
    let store = IdempotencyStore::open(&config.idempotency.path)
        .with_context(|| format!("opening idempotency store {}", config.idempotency.path))?;
    let removed = store.cleanup_old(config.idempotency.ttl_days)?;

    tracing::info!(
        removed,
        remaining = store.len(),
        ttl_days = config.idempotency.ttl_days,
        "Idempotency store pruned"
    );
    Ok(removed)
}

fn verify_and_report(config: &Config, pruned: usize) -> anyhow::Result<bool> {
    let registry = AuditRegistry::new(&config.audit.dir, config.audit.to_settings());
    let logger = registry.logger(config.environment.mode)?;

    let integrity = logger.verify_integrity();
    for issue in &integrity.errors {
        tracing::error!(line = issue.line, message = %issue.message, "Audit chain issue");
    }

    let report = logger.generate_daily_report(json!({
        "idempotency_pruned": pruned,
        "ttl_days": config.idempotency.ttl_days,
    }))?;

    tracing::info!(
        total_events = report.total_events,
        decisions = report.decisions,
        valid = report.integrity.valid,
        "Daily report generated"
    );
    Ok(integrity.valid && report.integrity.valid)
}
