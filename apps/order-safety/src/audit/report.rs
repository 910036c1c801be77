//! Daily audit summary.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AuditError;
use super::logger::{IntegrityReport, verify_file};
use crate::models::Environment;

/// Summary of one environment's audit day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    /// Environment the report covers.
    pub environment: Environment,
    /// Day covered, `YYYY-MM-DD`.
    pub date: String,
    /// Session that generated the report.
    pub session_id: String,
    /// Generation time, RFC 3339.
    pub generated_at: String,
    /// Records in the audit file.
    pub total_events: u64,
    /// Record count per event name.
    pub events_by_type: BTreeMap<String, u64>,
    /// Record count per level.
    pub events_by_level: BTreeMap<String, u64>,
    /// Lines in the decisions file.
    pub decisions: u64,
    /// Chain verification result.
    pub integrity: IntegrityReport,
    /// Caller-supplied statistics, redacted.
    pub stats: Value,
}

impl DailyReport {
    /// Write as pretty JSON via temp file and rename.
    pub fn write_to(&self, path: &Path) -> Result<(), AuditError> {
        let bytes = serde_json::to_vec_pretty(self)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let io_err = |source| AuditError::Io {
            path: tmp.clone(),
            source,
        };

        {
            let mut file = File::create(&tmp).map_err(io_err)?;
            file.write_all(&bytes).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp, path).map_err(|source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Default)]
struct EventCounts {
    total: u64,
    by_type: BTreeMap<String, u64>,
    by_level: BTreeMap<String, u64>,
}

pub(super) fn build_daily_report(
    env: Environment,
    date: NaiveDate,
    session_id: &str,
    audit_path: &Path,
    decisions_path: &Path,
    stats: Value,
) -> DailyReport {
    let counts = count_events(audit_path);

    DailyReport {
        environment: env,
        date: date.format("%Y-%m-%d").to_string(),
        session_id: session_id.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        total_events: counts.total,
        events_by_type: counts.by_type,
        events_by_level: counts.by_level,
        decisions: count_lines(decisions_path),
        integrity: verify_file(audit_path),
        stats,
    }
}

/// Best-effort scan; malformed lines are left to the integrity check.
fn count_events(path: &Path) -> EventCounts {
    let mut counts = EventCounts::default();
    let Ok(file) = File::open(path) else {
        return counts;
    };

    for line in BufReader::new(file).lines().map_while(Result::ok) {
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        counts.total += 1;
        if let Some(event) = value.get("event").and_then(Value::as_str) {
            *counts.by_type.entry(event.to_string()).or_default() += 1;
        }
        if let Some(level) = value.get("level").and_then(Value::as_str) {
            *counts.by_level.entry(level.to_string()).or_default() += 1;
        }
    }
    counts
}

fn count_lines(path: &Path) -> u64 {
    File::open(path).map_or(0, |file| {
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count() as u64
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use crate::audit::{AuditLevel, AuditLogger, AuditSettings, DecisionKind, REDACTED};
    use crate::models::Environment;

    #[test]
    fn test_report_counts_and_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let logger =
            AuditLogger::new(dir.path(), Environment::Live, AuditSettings::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let at = |minute| Utc.with_ymd_and_hms(2024, 5, 20, 14, minute, 0).unwrap();

        logger.log_event_at("ORDER_SUBMITTED", json!({}), AuditLevel::Info, at(1)).unwrap();
        logger.log_event_at("ORDER_SUBMITTED", json!({}), AuditLevel::Info, at(2)).unwrap();
        logger.log_event_at("RISK_EVENT", json!({}), AuditLevel::Warning, at(3)).unwrap();
        logger
            .log_decision_at(DecisionKind::Entry, "trend", "ETH/USDT", "breakout", json!({}), at(4))
            .unwrap();

        let report = logger
            .generate_daily_report_for(date, json!({"pnl": "12.5", "password": "hunter2"}))
            .unwrap();

        assert_eq!(report.total_events, 4);
        assert_eq!(report.events_by_type["ORDER_SUBMITTED"], 2);
        assert_eq!(report.events_by_level["WARNING"], 1);
        assert_eq!(report.decisions, 1);
        assert!(report.integrity.valid);
        assert_eq!(report.stats["password"], REDACTED);
        assert_eq!(report.session_id, logger.session_id());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(logger.report_path(date)).unwrap())
                .unwrap();
        assert_eq!(written["environment"], "LIVE");
        assert_eq!(written["date"], "2024-05-20");
        assert_eq!(written["total_events"], 4);
    }

    #[test]
    fn test_report_for_empty_day() {
        let dir = tempfile::tempdir().unwrap();
        let logger =
            AuditLogger::new(dir.path(), Environment::Testnet, AuditSettings::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let report = logger.generate_daily_report_for(date, json!({})).unwrap();
        assert_eq!(report.total_events, 0);
        assert_eq!(report.date, "2024-01-02");
        assert!(report.integrity.valid);
        assert!(dir.path().join("daily_testnet_20240102.json").exists());
    }
}
