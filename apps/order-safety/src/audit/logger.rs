//! Tamper-evident, day-rotated audit logger.
//!
//! Files, one set per environment per UTC day, under the audit directory:
//!
//! - `audit_{env}_{YYYYMMDD}.jsonl`: every record
//! - `decisions_{env}_{YYYYMMDD}.jsonl`: entry/exit/skip decisions only
//! - `daily_{env}_{YYYYMMDD}.json`: summary report, written on demand
//!
//! Every append is followed by `sync_data` before the call returns.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use super::error::AuditError;
use super::record::{AuditLevel, AuditRecord, GENESIS_HASH, chain_hash};
use super::redact::Redactor;
use super::report::{DailyReport, build_daily_report};
use crate::models::Environment;

/// Logger behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Fail writes when an existing day file cannot be read to continue its chain.
    pub strict_chain_recovery: bool,
    /// Keys redacted in addition to the built-in credential names.
    pub extra_redact_keys: Vec<String>,
}

/// Kind of strategy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    /// Open a position.
    Entry,
    /// Close a position.
    Exit,
    /// Deliberately do nothing.
    Skip,
}

impl DecisionKind {
    /// Audit event name.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Entry => "DECISION_ENTRY",
            Self::Exit => "DECISION_EXIT",
            Self::Skip => "DECISION_SKIP",
        }
    }
}

/// Order lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    /// Sent to and acknowledged by the exchange.
    Submitted,
    /// Blocked locally before reaching the exchange.
    Rejected,
    /// Intent already submitted; no new request made.
    Duplicate,
    /// Exchange refused or the request failed after retries.
    Failed,
    /// Filled on the exchange.
    Filled,
    /// Cancelled on the exchange.
    Cancelled,
}

impl OrderEventKind {
    /// Audit event name.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Submitted => "ORDER_SUBMITTED",
            Self::Rejected => "ORDER_REJECTED",
            Self::Duplicate => "ORDER_DUPLICATE",
            Self::Failed => "ORDER_FAILED",
            Self::Filled => "ORDER_FILLED",
            Self::Cancelled => "ORDER_CANCELLED",
        }
    }

    /// Default severity.
    #[must_use]
    pub const fn level(&self) -> AuditLevel {
        match self {
            Self::Rejected => AuditLevel::Warning,
            Self::Failed => AuditLevel::Error,
            Self::Submitted | Self::Duplicate | Self::Filled | Self::Cancelled => AuditLevel::Info,
        }
    }
}

/// One verification finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    /// 1-based line number; 0 when the file itself could not be read.
    pub line: usize,
    /// What is wrong.
    pub message: String,
}

/// Result of replaying a day file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// File that was checked.
    pub path: PathBuf,
    /// Whether no issue was found.
    pub valid: bool,
    /// Records read.
    pub records: usize,
    /// Findings in file order.
    pub errors: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    fn from_issues(path: &Path, records: usize, errors: Vec<IntegrityIssue>) -> Self {
        Self {
            path: path.to_path_buf(),
            valid: errors.is_empty(),
            records,
            errors,
        }
    }
}

#[derive(Debug)]
struct ChainState {
    date: Option<NaiveDate>,
    last_hash: String,
    event_counter: u64,
}

/// Audit logger bound to one environment.
///
/// Writers are serialized per instance so the append and the `last_hash`
/// update happen as one step.
#[derive(Debug)]
pub struct AuditLogger {
    dir: PathBuf,
    env: Environment,
    session_id: String,
    settings: AuditSettings,
    redactor: Redactor,
    state: Mutex<ChainState>,
}

impl AuditLogger {
    /// Create a logger writing under `dir`.
    pub fn new(
        dir: impl Into<PathBuf>,
        env: Environment,
        settings: AuditSettings,
    ) -> Result<Self, AuditError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| AuditError::Io {
            path: dir.clone(),
            source,
        })?;

        let session_id = derive_session_id(Utc::now());
        let redactor = Redactor::new(&settings.extra_redact_keys);

        info!(
            env = %env,
            session_id = %session_id,
            dir = %dir.display(),
            "Audit logger initialized"
        );

        Ok(Self {
            dir,
            env,
            session_id,
            settings,
            redactor,
            state: Mutex::new(ChainState {
                date: None,
                last_hash: GENESIS_HASH.to_string(),
                event_counter: 0,
            }),
        })
    }

    /// Environment this logger writes for.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.env
    }

    /// Session id stamped on every record.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Audit directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the full event file for `date`.
    #[must_use]
    pub fn audit_path(&self, date: NaiveDate) -> PathBuf {
        self.day_file("audit", date, "jsonl")
    }

    /// Path of the decisions file for `date`.
    #[must_use]
    pub fn decisions_path(&self, date: NaiveDate) -> PathBuf {
        self.day_file("decisions", date, "jsonl")
    }

    /// Path of the daily report for `date`.
    #[must_use]
    pub fn report_path(&self, date: NaiveDate) -> PathBuf {
        self.day_file("daily", date, "json")
    }

    fn day_file(&self, prefix: &str, date: NaiveDate, ext: &str) -> PathBuf {
        self.dir.join(format!(
            "{prefix}_{}_{}.{ext}",
            self.env.slug(),
            date.format("%Y%m%d")
        ))
    }

    /// Append one record.
    pub fn log_event(
        &self,
        event: &str,
        data: Value,
        level: AuditLevel,
    ) -> Result<AuditRecord, AuditError> {
        self.log_event_at(event, data, level, Utc::now())
    }

    /// [`Self::log_event`] stamped with an explicit time.
    pub fn log_event_at(
        &self,
        event: &str,
        data: Value,
        level: AuditLevel,
        now: DateTime<Utc>,
    ) -> Result<AuditRecord, AuditError> {
        self.append(event, data, level, now, false)
    }

    /// Record a risk check outcome.
    pub fn log_risk_event(
        &self,
        risk_type: &str,
        symbol: &str,
        details: Value,
        level: AuditLevel,
    ) -> Result<AuditRecord, AuditError> {
        self.log_risk_event_at(risk_type, symbol, details, level, Utc::now())
    }

    /// [`Self::log_risk_event`] stamped with an explicit time.
    pub fn log_risk_event_at(
        &self,
        risk_type: &str,
        symbol: &str,
        details: Value,
        level: AuditLevel,
        now: DateTime<Utc>,
    ) -> Result<AuditRecord, AuditError> {
        let data = json!({
            "risk_type": risk_type,
            "symbol": symbol,
            "details": details,
        });
        self.log_event_at("RISK_EVENT", data, level, now)
    }

    /// Record an order lifecycle transition.
    pub fn log_order_event(
        &self,
        kind: OrderEventKind,
        client_order_id: &str,
        symbol: &str,
        details: Value,
    ) -> Result<AuditRecord, AuditError> {
        self.log_order_event_at(kind, client_order_id, symbol, details, Utc::now())
    }

    /// [`Self::log_order_event`] stamped with an explicit time.
    pub fn log_order_event_at(
        &self,
        kind: OrderEventKind,
        client_order_id: &str,
        symbol: &str,
        details: Value,
        now: DateTime<Utc>,
    ) -> Result<AuditRecord, AuditError> {
        let data = json!({
            "client_order_id": client_order_id,
            "symbol": symbol,
            "details": details,
        });
        self.log_event_at(kind.event_name(), data, kind.level(), now)
    }

    /// Record a strategy decision, mirrored into the decisions file.
    pub fn log_decision(
        &self,
        kind: DecisionKind,
        strategy: &str,
        symbol: &str,
        reason: &str,
        details: Value,
    ) -> Result<AuditRecord, AuditError> {
        self.log_decision_at(kind, strategy, symbol, reason, details, Utc::now())
    }

    /// [`Self::log_decision`] stamped with an explicit time.
    pub fn log_decision_at(
        &self,
        kind: DecisionKind,
        strategy: &str,
        symbol: &str,
        reason: &str,
        details: Value,
        now: DateTime<Utc>,
    ) -> Result<AuditRecord, AuditError> {
        let data = json!({
            "decision": kind,
            "strategy": strategy,
            "symbol": symbol,
            "reason": reason,
            "details": details,
        });
        self.append(kind.event_name(), data, AuditLevel::Info, now, true)
    }

    fn append(
        &self,
        event: &str,
        data: Value,
        level: AuditLevel,
        now: DateTime<Utc>,
        mirror_decision: bool,
    ) -> Result<AuditRecord, AuditError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let date = now.date_naive();
        if state.date != Some(date) {
            let path = self.audit_path(date);
            state.last_hash = self.resume_chain(&path)?;
            state.date = Some(date);
            debug!(env = %self.env, file = %path.display(), "Audit file set rolled over");
        }

        let record = AuditRecord::new(
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.session_id.clone(),
            state.event_counter + 1,
            level,
            event.to_string(),
            self.redactor.redact(&data),
            state.last_hash.clone(),
        )?;
        let line = record.to_line()?;

        append_line(&self.audit_path(date), &line)?;
        state.last_hash.clone_from(&record.hash);
        state.event_counter = record.event_id;

        if mirror_decision {
            append_line(&self.decisions_path(date), &line)?;
        }

        Ok(record)
    }

    /// Last record hash of an existing day file, or genesis.
    fn resume_chain(&self, path: &Path) -> Result<String, AuditError> {
        if !path.exists() {
            return Ok(GENESIS_HASH.to_string());
        }

        match last_record_hash(path) {
            Ok(Some(hash)) => {
                info!(file = %path.display(), "Continuing existing audit chain");
                Ok(hash)
            }
            Ok(None) => Ok(GENESIS_HASH.to_string()),
            Err(reason) if self.settings.strict_chain_recovery => Err(AuditError::ChainRecovery {
                path: path.to_path_buf(),
                reason,
            }),
            Err(reason) => {
                error!(
                    file = %path.display(),
                    reason = %reason,
                    "Unreadable audit history, restarting chain from genesis"
                );
                Ok(GENESIS_HASH.to_string())
            }
        }
    }

    /// Verify today's audit file.
    #[must_use]
    pub fn verify_integrity(&self) -> IntegrityReport {
        self.verify_integrity_for(Utc::now().date_naive())
    }

    /// Verify the audit file for `date`.
    #[must_use]
    pub fn verify_integrity_for(&self, date: NaiveDate) -> IntegrityReport {
        verify_file(&self.audit_path(date))
    }

    /// Write today's daily report.
    pub fn generate_daily_report(&self, stats: Value) -> Result<DailyReport, AuditError> {
        self.generate_daily_report_for(Utc::now().date_naive(), stats)
    }

    /// Write the daily report for `date`.
    pub fn generate_daily_report_for(
        &self,
        date: NaiveDate,
        stats: Value,
    ) -> Result<DailyReport, AuditError> {
        let report = build_daily_report(
            self.env,
            date,
            &self.session_id,
            &self.audit_path(date),
            &self.decisions_path(date),
            self.redactor.redact(&stats),
        );
        let path = self.report_path(date);
        report.write_to(&path)?;

        if report.integrity.valid {
            info!(env = %self.env, report = %path.display(), "Daily audit report written");
        } else {
            warn!(
                env = %self.env,
                report = %path.display(),
                errors = report.integrity.errors.len(),
                "Daily audit report written with integrity errors"
            );
        }
        Ok(report)
    }
}

/// Replay `path` from genesis and report every broken link.
///
/// Never fails: unreadable files and malformed lines become findings. A
/// missing file is an empty, valid chain.
#[must_use]
pub fn verify_file(path: &Path) -> IntegrityReport {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return IntegrityReport::from_issues(path, 0, Vec::new());
        }
        Err(e) => {
            let issue = IntegrityIssue {
                line: 0,
                message: format!("cannot open audit file: {e}"),
            };
            return IntegrityReport::from_issues(path, 0, vec![issue]);
        }
    };

    let mut errors = Vec::new();
    let mut records = 0;
    // None after an unparseable line: the next link cannot be checked
    let mut expected_prev = Some(GENESIS_HASH.to_string());

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line_no = idx + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                errors.push(IntegrityIssue {
                    line: line_no,
                    message: format!("read error: {e}"),
                });
                expected_prev = None;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        records += 1;

        match check_line(&line, expected_prev.as_deref()) {
            Ok(hash) => expected_prev = Some(hash),
            Err((message, stored_hash)) => {
                errors.push(IntegrityIssue { line: line_no, message });
                expected_prev = stored_hash;
            }
        }
    }

    IntegrityReport::from_issues(path, records, errors)
}

/// Returns the stored hash, or the problem plus the stored hash if one was readable.
fn check_line(line: &str, expected_prev: Option<&str>) -> Result<String, (String, Option<String>)> {
    let mut value: Value =
        serde_json::from_str(line).map_err(|e| (format!("invalid JSON: {e}"), None))?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| ("record is not a JSON object".to_string(), None))?;

    let stored = match obj.remove("hash") {
        Some(Value::String(hash)) => hash,
        _ => return Err(("missing hash".to_string(), None)),
    };
    let prev = match obj.get("prev_hash") {
        Some(Value::String(prev)) => prev.clone(),
        _ => return Err(("missing prev_hash".to_string(), Some(stored))),
    };

    if let Some(expected) = expected_prev {
        if prev != expected {
            return Err((
                format!("prev_hash {prev} does not link to previous hash {expected}"),
                Some(stored),
            ));
        }
    }

    let computed = chain_hash(&value, &prev);
    if computed != stored {
        return Err((
            format!("hash mismatch: stored {stored}, computed {computed}"),
            Some(stored),
        ));
    }

    Ok(stored)
}

fn last_record_hash(path: &Path) -> Result<Option<String>, String> {
    let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let Some(last) = contents.lines().rev().find(|l| !l.trim().is_empty()) else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(last).map_err(|e| format!("last line: {e}"))?;
    value
        .get("hash")
        .and_then(Value::as_str)
        .map(|h| Some(h.to_string()))
        .ok_or_else(|| "last line has no hash".to_string())
}

fn append_line(path: &Path, line: &str) -> Result<(), AuditError> {
    let io_err = |source| AuditError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(format!("{line}\n").as_bytes()).map_err(io_err)?;
    file.sync_data().map_err(io_err)
}

fn derive_session_id(now: DateTime<Utc>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros() * 1000);
    let digest = Sha256::digest(nanos.to_string().as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn logger(dir: &tempfile::TempDir) -> AuditLogger {
        AuditLogger::new(dir.path(), Environment::Testnet, AuditSettings::default()).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_chain_links_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(&dir);

        let first = logger
            .log_event_at("A", json!({"n": 1}), AuditLevel::Info, at(1, 9))
            .unwrap();
        let second = logger
            .log_event_at("B", json!({"n": 2}), AuditLevel::Warning, at(1, 10))
            .unwrap();

        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(second.prev_hash, first.hash);
        assert_eq!((first.event_id, second.event_id), (1, 2));

        let report = logger.verify_integrity_for(date(1));
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(report.records, 2);
    }

    #[test]
    fn test_file_names_follow_env_and_date() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(&dir);
        logger
            .log_event_at("A", json!({}), AuditLevel::Info, at(5, 0))
            .unwrap();

        assert!(dir.path().join("audit_testnet_20240305.jsonl").exists());
        assert_eq!(
            logger.report_path(date(5)),
            dir.path().join("daily_testnet_20240305.json")
        );
    }

    #[test]
    fn test_rollover_restarts_at_genesis_keeps_event_ids() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(&dir);

        logger.log_event_at("A", json!({}), AuditLevel::Info, at(1, 23)).unwrap();
        let next_day = logger
            .log_event_at("B", json!({}), AuditLevel::Info, at(2, 0))
            .unwrap();

        assert_eq!(next_day.prev_hash, GENESIS_HASH);
        assert_eq!(next_day.event_id, 2);
        assert!(logger.verify_integrity_for(date(1)).valid);
        assert!(logger.verify_integrity_for(date(2)).valid);
    }

    #[test]
    fn test_data_is_redacted_before_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(&dir);
        let record = logger
            .log_event_at(
                "CONNECT",
                json!({"api_key": "live-key", "venue": "binance"}),
                AuditLevel::Info,
                at(1, 0),
            )
            .unwrap();

        assert_eq!(record.data["api_key"], crate::audit::REDACTED);
        let raw = fs::read_to_string(logger.audit_path(date(1))).unwrap();
        assert!(!raw.contains("live-key"));
    }

    #[test]
    fn test_decisions_are_mirrored() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(&dir);

        logger
            .log_event_at("HEARTBEAT", json!({}), AuditLevel::Info, at(1, 0))
            .unwrap();
        let decision = logger
            .log_decision_at(DecisionKind::Skip, "trend", "BTC/USDT", "spread too wide", json!({}), at(1, 1))
            .unwrap();

        let mirrored = fs::read_to_string(logger.decisions_path(date(1))).unwrap();
        let lines: Vec<&str> = mirrored.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, decision);
        assert_eq!(parsed.event, "DECISION_SKIP");
        assert_eq!(parsed.data["decision"], "SKIP");
    }

    #[test]
    fn test_new_logger_continues_existing_chain() {
        let dir = tempfile::tempdir().unwrap();
        let last = {
            let first = logger(&dir);
            first.log_event_at("A", json!({}), AuditLevel::Info, at(1, 0)).unwrap();
            first.log_event_at("B", json!({}), AuditLevel::Info, at(1, 1)).unwrap()
        };

        let restarted = logger(&dir);
        let record = restarted
            .log_event_at("C", json!({}), AuditLevel::Info, at(1, 2))
            .unwrap();

        assert_eq!(record.prev_hash, last.hash);
        assert_eq!(record.event_id, 1);
        assert!(restarted.verify_integrity_for(date(1)).valid);
    }

    #[test]
    fn test_unreadable_history_lenient_restarts_from_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(&dir);
        fs::write(logger.audit_path(date(1)), "garbage\n").unwrap();

        let record = logger
            .log_event_at("A", json!({}), AuditLevel::Info, at(1, 0))
            .unwrap();
        assert_eq!(record.prev_hash, GENESIS_HASH);
        assert!(!logger.verify_integrity_for(date(1)).valid);
    }

    #[test]
    fn test_unreadable_history_strict_fails() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AuditSettings {
            strict_chain_recovery: true,
            ..AuditSettings::default()
        };
        let logger = AuditLogger::new(dir.path(), Environment::Live, settings).unwrap();
        fs::write(logger.audit_path(date(1)), "garbage\n").unwrap();

        let Err(err) = logger.log_event_at("A", json!({}), AuditLevel::Info, at(1, 0)) else {
            panic!("expected chain recovery failure");
        };
        assert!(matches!(err, AuditError::ChainRecovery { .. }));
    }

    #[test]
    fn test_tampered_data_is_reported_with_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(&dir);
        for i in 0..3 {
            logger
                .log_event_at("FILL", json!({"qty": format!("{i}.5")}), AuditLevel::Info, at(1, i))
                .unwrap();
        }

        let path = logger.audit_path(date(1));
        let tampered = fs::read_to_string(&path).unwrap().replacen("1.5", "9.5", 1);
        fs::write(&path, tampered).unwrap();

        let report = verify_file(&path);
        assert!(!report.valid);
        assert_eq!(report.errors[0].line, 2);
        assert!(report.errors[0].message.contains("hash mismatch"));
    }

    #[test]
    fn test_deleted_line_breaks_linkage() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(&dir);
        for i in 0..3 {
            logger.log_event_at("E", json!({"i": i}), AuditLevel::Info, at(1, i)).unwrap();
        }

        let path = logger.audit_path(date(1));
        let kept: Vec<String> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .enumerate()
            .filter(|(i, _)| *i != 1)
            .map(|(_, l)| format!("{l}\n"))
            .collect();
        fs::write(&path, kept.concat()).unwrap();

        let report = verify_file(&path);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 2);
        assert!(report.errors[0].message.contains("does not link"));
    }

    #[test]
    fn test_missing_file_verifies_empty() {
        let dir = tempfile::tempdir().unwrap();
        let report = verify_file(&dir.path().join("nope.jsonl"));
        assert!(report.valid);
        assert_eq!(report.records, 0);
    }

    #[test]
    fn test_order_event_levels() {
        assert_eq!(OrderEventKind::Failed.level(), AuditLevel::Error);
        assert_eq!(OrderEventKind::Rejected.event_name(), "ORDER_REJECTED");
        assert_eq!(DecisionKind::Entry.event_name(), "DECISION_ENTRY");
    }
}
