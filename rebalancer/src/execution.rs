//! Command workflows: load inputs → compute → display → audit.
//!
//! This is where the config, the snapshot cache, the balance export, and the
//! audit trail meet the engine.

use std::path::{Path, PathBuf};

use capweight::metrics::{periods_per_year, report_metrics};
use capweight::persistence::{self, LATEST};
use capweight::{
    Asset, Holdings, PeriodReport, Simulation, SimulationReport, Snapshot, SnapshotHistory,
    TargetSet, Trade, TradePlan, compute_targets, compute_trades,
};
use chrono::NaiveDate;
use log::{info, warn};

use crate::audit::{self, AuditLog};
use crate::balances;
use crate::config::Config;
use crate::error::{Error, Result};

/// Period key format of the snapshot cache (`20180107`).
const PERIOD_FORMAT: &str = "%Y%m%d";

/// Options for a single-shot plan.
pub struct PlanOptions {
    /// Balance export CSV
    pub balances: PathBuf,
    /// Snapshot file to plan against instead of the cached latest one
    pub snapshot: Option<PathBuf>,
    /// Print the plan as JSON instead of a table
    pub json: bool,
}

/// Options for a historical replay.
#[derive(Default)]
pub struct SimulateOptions {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Normalize a `YYYY-MM-DD` or `YYYYMMDD` date to a cache period key.
pub fn parse_period(input: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, PERIOD_FORMAT))
        .map_err(|_| Error::Date(input.to_string()))?;
    Ok(date.format(PERIOD_FORMAT).to_string())
}

/// Load one snapshot file, keeping its path in the error.
pub fn load_snapshot_file(path: &Path) -> Result<Snapshot> {
    persistence::load_snapshot(path).map_err(|e| Error::Snapshot {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load the cached snapshot history, restricted to `[from, to]`.
pub fn load_window(config: &Config, opts: &SimulateOptions) -> Result<SnapshotHistory> {
    let dir = config.snapshot_dir();
    let history = persistence::load_history(dir).map_err(|e| Error::Snapshot {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let from = opts.from.as_deref().map(parse_period).transpose()?;
    let to = opts.to.as_deref().map(parse_period).transpose()?;
    Ok(history.between(from.as_deref(), to.as_deref()))
}

fn snapshot_for(config: &Config, path: Option<&Path>) -> Result<(String, Snapshot)> {
    match path {
        Some(p) => Ok((p.display().to_string(), load_snapshot_file(p)?)),
        None => Ok((LATEST.to_string(), load_snapshot_file(&config.latest_snapshot_path())?)),
    }
}

/// Targets and trades for `holdings` against one snapshot.
pub fn plan(config: &Config, snapshot: &Snapshot, holdings: &Holdings) -> Result<(TargetSet, TradePlan)> {
    let blacklist = config.blacklist();
    let targets = compute_targets(snapshot, |a| blacklist.allows(a), &config.allocation())?;
    let trades = compute_trades(&targets, holdings, snapshot)?;
    Ok((targets, trades))
}

/// Single-shot rebalance of an exported portfolio.
pub fn run_plan(config: &Config, opts: &PlanOptions) -> Result<()> {
    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(
        &mut audit,
        "plan",
        serde_json::json!({
            "balances": opts.balances.display().to_string(),
            "snapshot": opts.snapshot.as_ref().map(|p| p.display().to_string()),
        }),
    )?;

    let holdings = balances::load_balances(&opts.balances, config.holdings.percent_in_play)?;
    let (label, snapshot) = snapshot_for(config, opts.snapshot.as_deref())?;
    let (targets, trade_plan) = plan(config, &snapshot, &holdings)?;

    audit::log_targets(&mut audit, &label, &targets)?;
    audit::log_trades(&mut audit, &label, &trade_plan)?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&trade_plan)?);
    } else {
        println!(
            "Account value: ${:.2} (cash ${:.2}, {} positions)\n",
            trade_plan.account_value,
            holdings.cash(),
            holdings.len()
        );
        print!("{}", format_trades(&trade_plan.trades));
    }

    let actionable = trade_plan.actionable().count();
    audit::log_run_completed(&mut audit, 1, actionable)?;
    info!("{actionable} trades planned. Audit logged to {}", config.audit_path().display());
    Ok(())
}

/// Print the target weights of one snapshot.
pub fn run_targets(config: &Config, snapshot: Option<&Path>) -> Result<()> {
    let (label, snapshot) = snapshot_for(config, snapshot)?;
    let blacklist = config.blacklist();
    let targets = compute_targets(&snapshot, |a| blacklist.allows(a), &config.allocation())?;

    println!("TARGETS ({label}):");
    print!("{}", format_targets(&targets));
    Ok(())
}

/// Replay the cached history and report the trajectory.
///
/// A period that cannot be computed ends the run; the periods before it are
/// still printed and audited, then [`Error::SimulationAborted`] is returned.
pub fn run_simulation(config: &Config, opts: &SimulateOptions) -> Result<SimulationReport> {
    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(
        &mut audit,
        "simulate",
        serde_json::json!({ "from": opts.from, "to": opts.to }),
    )?;

    let history = load_window(config, opts)?;
    if history.is_empty() {
        warn!("no cached snapshots in {}", config.snapshot_dir().display());
    }

    let sim_config = config.simulation_config();
    let blacklist = config.blacklist();
    let simulation = Simulation::new(&history, |a: &Asset| blacklist.allows(a), sim_config)?;
    println!(
        "Replaying {} of {} snapshots (every {}), starting with ${:.2}\n",
        simulation.schedule().len(),
        history.len(),
        sim_config.stride,
        sim_config.starting_cash
    );
    let report = simulation.run();

    for period in &report.periods {
        print!("{}", format_period(period));
        audit::log_period(&mut audit, period)?;
    }

    if let Some(abort) = &report.aborted {
        audit::log_aborted(&mut audit, abort)?;
        return Err(Error::SimulationAborted {
            period: abort.period.clone(),
            source: abort.error.clone(),
        });
    }

    if let Some(value) = report.final_value() {
        println!("Final account value: ${value:.2}\n");
    }
    if let Some(metrics) = report_metrics(&report, periods_per_year(sim_config.stride)) {
        print!("{metrics}");
    }

    audit::log_run_completed(&mut audit, report.periods.len(), report.trade_count())?;
    Ok(report)
}

// === Display ===

/// Trade table for every trade that changes a holding.
pub fn format_trades(trades: &[Trade]) -> String {
    let rows: Vec<&Trade> = trades.iter().filter(|t| !t.is_noop()).collect();
    if rows.is_empty() {
        return "No trades needed.\n".to_string();
    }

    let mut out = format!(
        "  {:8} {:16} {:6} {:>12} {:>12} {:>9} {:>9} {:>12} {:>12} {:>14} {:>14}\n",
        "Symbol",
        "Name",
        "Action",
        "Amount",
        "Price/Coin",
        "Target %",
        "Current %",
        "Target USD",
        "Current USD",
        "Target Coins",
        "Current Coins",
    );
    for t in rows {
        out.push_str(&format!(
            "  {:8} {:16} {:6} {:>12} {:>12} {:>8.3}% {:>8.3}% {:>12} {:>12} {:>14.6} {:>14.6}\n",
            t.symbol,
            t.name,
            t.action.to_string(),
            dollars(t.amount()),
            dollars(t.price),
            t.target_allocation * 100.0,
            t.current_allocation * 100.0,
            dollars(t.target_value()),
            dollars(t.current_value()),
            t.target_coins,
            t.current_coins,
        ));
    }
    out
}

/// Ranked target weights.
pub fn format_targets(targets: &TargetSet) -> String {
    let mut out = String::new();
    if targets.is_degenerate() {
        out.push_str("  no valid targets (zero total market cap)\n");
    }
    for (i, r) in targets.iter().enumerate() {
        out.push_str(&format!(
            "  {:>3}  {:8} {:16} {:>8.3}%  mcap ${:.0}\n",
            i + 1,
            r.asset.symbol,
            r.asset.name,
            r.target_allocation * 100.0,
            r.asset.market_cap,
        ));
    }
    out
}

fn format_period(report: &PeriodReport) -> String {
    format!(
        "{}{} Previous account value: ${:.2}\n{} Account value: ${:.2}\n\n",
        format_trades(&report.trades),
        report.period,
        report.pre_trade_value,
        report.period,
        report.post_trade_value
    )
}

fn dollars(value: f64) -> String {
    if value < 0.0 {
        format!("-${:.3}", -value)
    } else {
        format!("${value:.3}")
    }
}
