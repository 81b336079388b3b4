//! JSONL audit trail logging.
//!
//! Each rebalancer run appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use capweight::{PeriodReport, SimulationAbort, TargetSet, TradePlan, Trade};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }
}

fn trade_json(t: &Trade) -> serde_json::Value {
    serde_json::json!({
        "id": t.id.as_str(),
        "symbol": t.symbol,
        "action": t.action.to_string(),
        "price": t.price,
        "current_coins": t.current_coins,
        "target_coins": t.target_coins,
        "amount": t.amount(),
    })
}

/// Convenience: log a run start event.
pub fn log_run_started(audit: &mut AuditLog, command: &str, detail: serde_json::Value) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "command": command,
            "detail": detail,
        }),
    )
}

/// Convenience: log the target weights of one snapshot.
pub fn log_targets(audit: &mut AuditLog, period: &str, targets: &TargetSet) -> Result<()> {
    let weights: Vec<_> = targets
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.asset.id.as_str(),
                "symbol": r.asset.symbol,
                "target": r.target_allocation,
            })
        })
        .collect();

    audit.log(
        "targets_computed",
        serde_json::json!({
            "period": period,
            "rounds": targets.rounds(),
            "degenerate": targets.is_degenerate(),
            "targets": weights,
        }),
    )
}

/// Convenience: log a computed trade plan (only trades that change a holding).
pub fn log_trades(audit: &mut AuditLog, period: &str, plan: &TradePlan) -> Result<()> {
    let trades: Vec<_> = plan.actionable().map(trade_json).collect();
    audit.log(
        "trades_computed",
        serde_json::json!({
            "period": period,
            "account_value": plan.account_value,
            "trades": trades,
        }),
    )
}

/// Convenience: log one applied simulation period.
pub fn log_period(audit: &mut AuditLog, report: &PeriodReport) -> Result<()> {
    let trades = report.trades.iter().filter(|t| !t.is_noop()).count();
    audit.log(
        "period_completed",
        serde_json::json!({
            "period": report.period,
            "pre_trade_value": report.pre_trade_value,
            "post_trade_value": report.post_trade_value,
            "trades": trades,
        }),
    )
}

/// Convenience: log the period that ended a simulation.
pub fn log_aborted(audit: &mut AuditLog, abort: &SimulationAbort) -> Result<()> {
    audit.log(
        "simulation_aborted",
        serde_json::json!({
            "period": abort.period,
            "error": abort.error.to_string(),
        }),
    )
}

/// Convenience: log run completion.
pub fn log_run_completed(audit: &mut AuditLog, periods: usize, trades: usize) -> Result<()> {
    audit.log(
        "run_completed",
        serde_json::json!({
            "periods": periods,
            "trades": trades,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use capweight::{AllocationConfig, Asset, Holdings, Snapshot, compute_targets, compute_trades};

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn audit_log_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log_run_started(&mut log, "plan", serde_json::json!({"balances": "b.csv"})).unwrap();
            log.log("test_data", serde_json::json!({"key": "value"})).unwrap();
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "run_started");
        assert_eq!(lines[0]["command"], "plan");
        assert!(lines[0]["ts"].is_string());
        assert_eq!(lines[1]["key"], "value");
    }

    #[test]
    fn audit_log_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        for _ in 0..2 {
            let mut log = AuditLog::open(&path).unwrap();
            log_run_completed(&mut log, 3, 7).unwrap();
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["trades"], 7);
    }

    #[test]
    fn audit_log_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdir").join("deep").join("audit.jsonl");

        let mut log = AuditLog::open(&path).unwrap();
        log_run_completed(&mut log, 0, 0).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn targets_and_trades_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let snap = Snapshot::new(vec![
            Asset::new("AAA", "Alpha", 10.0, 600.0),
            Asset::new("BBB", "Beta", 5.0, 400.0),
        ])
        .unwrap();
        let targets = compute_targets(&snap, |_| true, &AllocationConfig::new(2)).unwrap();
        let plan = compute_trades(&targets, &Holdings::new(100.0), &snap).unwrap();

        {
            let mut log = AuditLog::open(&path).unwrap();
            log_targets(&mut log, "latest", &targets).unwrap();
            log_trades(&mut log, "latest", &plan).unwrap();
        }

        let lines = read_lines(&path);
        assert_eq!(lines[0]["event"], "targets_computed");
        assert_eq!(lines[0]["targets"].as_array().unwrap().len(), 2);
        assert_eq!(lines[1]["event"], "trades_computed");
        assert_eq!(lines[1]["account_value"], 100.0);
        assert_eq!(lines[1]["trades"][0]["action"], "BUY");
        assert_eq!(lines[1]["trades"][0]["symbol"], "AAA");
    }
}
