//! Historical replay of the rebalancing strategy.
//!
//! The driver walks the periods of a [`SnapshotStore`] in ascending order,
//! sampling every `stride`-th one. For each sampled period it computes
//! targets and trades against the running holdings, applies the trades
//! (SELL, then BUY, then HOLD), and records the account value before and
//! after. Periods depend on the holdings left by the previous one, so the
//! replay is strictly sequential and forward-only.

use std::fmt;

use log::{debug, info, warn};

use crate::allocation::{AllocationConfig, compute_targets};
use crate::diff::{TradePlan, compute_trades};
use crate::error::{Error, Result};
use crate::holdings::Holdings;
use crate::snapshot::SnapshotStore;
use crate::types::{Action, Asset, AssetId, Trade};

/// Default sampling stride: every 4th snapshot.
pub const DEFAULT_STRIDE: usize = 4;

/// Relative tolerance for treating a cash shortfall as rounding dust.
const CASH_TOLERANCE: f64 = 1e-9;

/// What to do when a BUY costs more than the available cash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CashPolicy {
    /// Shrink the BUY to what cash can pay for. Cash never goes negative.
    #[default]
    NonNegative,
    /// Let cash go negative (margin-like).
    AllowNegative,
}

/// Parameters of a simulation run.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    pub allocation: AllocationConfig,
    /// Cash at the start of the run
    pub starting_cash: f64,
    /// Rebalance on every `stride`-th snapshot
    pub stride: usize,
    pub cash_policy: CashPolicy,
}

impl SimulationConfig {
    pub fn new(allocation: AllocationConfig, starting_cash: f64) -> Self {
        Self {
            allocation,
            starting_cash,
            stride: DEFAULT_STRIDE,
            cash_policy: CashPolicy::default(),
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_cash_policy(mut self, cash_policy: CashPolicy) -> Self {
        self.cash_policy = cash_policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.allocation.validate()?;
        if self.stride == 0 {
            return Err(Error::InvalidConfig("stride must be >= 1".into()));
        }
        if !self.starting_cash.is_finite() || self.starting_cash < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "starting_cash must be finite and >= 0, got {}",
                self.starting_cash
            )));
        }
        Ok(())
    }
}

/// Where the driver is within the current period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationPhase {
    AwaitingPeriod,
    TradesCalculated,
    TradesApplied,
    Terminal,
}

impl fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationPhase::AwaitingPeriod => write!(f, "AWAITING_PERIOD"),
            SimulationPhase::TradesCalculated => write!(f, "TRADES_CALCULATED"),
            SimulationPhase::TradesApplied => write!(f, "TRADES_APPLIED"),
            SimulationPhase::Terminal => write!(f, "TERMINAL"),
        }
    }
}

/// One sampled period of the trajectory.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeriodReport {
    pub period: String,
    /// Account value before any trade was applied
    pub pre_trade_value: f64,
    /// Cash + positions after the trades, at the same prices
    pub post_trade_value: f64,
    pub trades: Vec<Trade>,
}

/// The period that ended a run early, and why.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationAbort {
    pub period: String,
    pub error: Error,
}

/// Full outcome of a run.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    /// Completed periods, in order
    pub periods: Vec<PeriodReport>,
    /// Holdings after the last applied period
    pub final_holdings: Holdings,
    /// Set when a period failed; `periods` holds everything before it
    pub aborted: Option<SimulationAbort>,
}

impl SimulationReport {
    /// True if every sampled period was applied.
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    /// Post-trade value of the last completed period.
    pub fn final_value(&self) -> Option<f64> {
        self.periods.last().map(|p| p.post_trade_value)
    }

    /// Pre-trade account values, one per completed period.
    pub fn values(&self) -> Vec<f64> {
        self.periods.iter().map(|p| p.pre_trade_value).collect()
    }

    /// Simple return of each holding interval: from one period's post-trade
    /// value to the next period's pre-trade value.
    ///
    /// An interval starting from a non-positive value contributes 0.
    pub fn returns(&self) -> Vec<f64> {
        self.periods
            .windows(2)
            .map(|w| {
                let prev = w[0].post_trade_value;
                if prev > 0.0 {
                    w[1].pre_trade_value / prev - 1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Number of trades that changed a holding, across all periods.
    pub fn trade_count(&self) -> usize {
        self.periods
            .iter()
            .map(|p| p.trades.iter().filter(|t| !t.is_noop()).count())
            .sum()
    }
}

/// Apply trades to `holdings`: SELL, then BUY, then HOLD.
///
/// SELL sets the coins to target and credits the proceeds; cash itself is
/// never sold. BUY creates the position if needed, sets the coins, and debits
/// the cost. HOLD changes nothing. Returns the post-trade account value:
/// remaining cash plus `price * coins` over every traded position.
pub fn apply_trades(holdings: &mut Holdings, trades: &[Trade], policy: CashPolicy) -> Result<f64> {
    let mut positions_value = 0.0;

    for trade in trades.iter().filter(|t| t.action == Action::Sell) {
        if trade.id.is_cash() {
            continue;
        }
        if !holdings.holds(&trade.id) {
            return Err(Error::MissingHolding {
                id: trade.id.clone(),
            });
        }
        holdings.set_coins(trade.id.clone(), trade.target_coins);
        holdings.adjust_cash((trade.current_coins - trade.target_coins) * trade.price);
        positions_value += trade.price * trade.target_coins;
    }

    for trade in trades.iter().filter(|t| t.action == Action::Buy) {
        if trade.id.is_cash() {
            continue;
        }
        let mut coins = trade.target_coins;
        let cost = (coins - trade.current_coins) * trade.price;
        let tolerance = CASH_TOLERANCE * (holdings.cash().abs() + cost.abs()).max(1.0);

        if policy == CashPolicy::NonNegative && cost > holdings.cash() + tolerance {
            let affordable = trade.current_coins + holdings.cash().max(0.0) / trade.price;
            warn!(
                "insufficient cash for {}: need {cost:.2}, have {:.2}; buying {affordable} instead of {coins}",
                trade.id,
                holdings.cash()
            );
            coins = affordable;
        }

        holdings.set_coins(trade.id.clone(), coins);
        holdings.adjust_cash((trade.current_coins - coins) * trade.price);
        positions_value += trade.price * coins;
    }

    for trade in trades.iter().filter(|t| t.action == Action::Hold) {
        positions_value += trade.price * holdings.coins(&trade.id);
    }

    if policy == CashPolicy::NonNegative && holdings.cash() < 0.0 {
        // Only rounding dust can get here.
        holdings.set_coins(AssetId::cash(), 0.0);
    }

    Ok(holdings.cash() + positions_value)
}

/// Step-by-step driver over a snapshot store.
pub struct Simulation<'a, S: ?Sized, F> {
    store: &'a S,
    eligible: F,
    config: SimulationConfig,
    /// Sampled periods, ascending
    schedule: Vec<&'a str>,
    /// Index into `schedule` of the current period
    cursor: usize,
    holdings: Holdings,
    phase: SimulationPhase,
    pending: Option<TradePlan>,
}

impl<'a, S, F> Simulation<'a, S, F>
where
    S: SnapshotStore + ?Sized,
    F: Fn(&Asset) -> bool,
{
    /// Prepare a run: validates the config, sorts and samples the periods,
    /// and starts from `starting_cash` with no positions.
    pub fn new(store: &'a S, eligible: F, config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut periods = store.periods();
        periods.sort_unstable();
        let schedule: Vec<&str> = periods.into_iter().step_by(config.stride).collect();
        debug!(
            "simulation over {} sampled periods (stride {})",
            schedule.len(),
            config.stride
        );

        Ok(Self {
            store,
            eligible,
            holdings: Holdings::new(config.starting_cash),
            config,
            schedule,
            cursor: 0,
            phase: SimulationPhase::AwaitingPeriod,
            pending: None,
        })
    }

    // === Queries ===

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    /// The sampled periods this run will visit.
    pub fn schedule(&self) -> &[&'a str] {
        &self.schedule
    }

    /// Period the driver is on (or would start next).
    pub fn current_period(&self) -> Option<&'a str> {
        self.schedule.get(self.cursor).copied()
    }

    // === Execution ===

    /// Run one sampled period end to end.
    ///
    /// Returns `Ok(None)` once the schedule is exhausted. An error leaves the
    /// driver in [`SimulationPhase::Terminal`]; the holdings keep whatever
    /// the last successful period produced.
    pub fn step(&mut self) -> Result<Option<PeriodReport>> {
        if self.phase == SimulationPhase::TradesApplied {
            self.cursor += 1;
            self.transition(SimulationPhase::AwaitingPeriod);
        }
        if self.phase == SimulationPhase::Terminal {
            return Ok(None);
        }
        let Some(period) = self.current_period() else {
            self.transition(SimulationPhase::Terminal);
            return Ok(None);
        };

        let result = self.calculate(period).and_then(|()| self.apply(period));
        if result.is_err() {
            self.pending = None;
            self.transition(SimulationPhase::Terminal);
        }
        result.map(Some)
    }

    /// Run to the end of the schedule or the first failing period.
    pub fn run(mut self) -> SimulationReport {
        let mut periods = Vec::with_capacity(self.schedule.len());
        let aborted = loop {
            match self.step() {
                Ok(Some(report)) => periods.push(report),
                Ok(None) => break None,
                Err(error) => {
                    let period = self.current_period().unwrap_or_default().to_string();
                    warn!("simulation aborted at {period}: {error}");
                    break Some(SimulationAbort { period, error });
                }
            }
        };

        SimulationReport {
            periods,
            final_holdings: self.holdings,
            aborted,
        }
    }

    fn calculate(&mut self, period: &str) -> Result<()> {
        let store = self.store;
        let snapshot = store
            .snapshot(period)
            .ok_or_else(|| Error::InvalidSnapshot(format!("no snapshot for period {period}")))?;

        let targets = compute_targets(snapshot, &self.eligible, &self.config.allocation)?;
        let plan = compute_trades(&targets, &self.holdings, snapshot)?;
        info!("{period} previous account value: {:.2}", plan.account_value);

        self.pending = Some(plan);
        self.transition(SimulationPhase::TradesCalculated);
        Ok(())
    }

    fn apply(&mut self, period: &str) -> Result<PeriodReport> {
        let plan = self.pending.take().unwrap_or_default();
        let post_trade_value =
            apply_trades(&mut self.holdings, &plan.trades, self.config.cash_policy)?;
        info!("{period} account value: {post_trade_value:.2}");

        self.transition(SimulationPhase::TradesApplied);
        Ok(PeriodReport {
            period: period.to_string(),
            pre_trade_value: plan.account_value,
            post_trade_value,
            trades: plan.trades,
        })
    }

    fn transition(&mut self, next: SimulationPhase) {
        debug!("simulation phase {} -> {next}", self.phase);
        self.phase = next;
    }
}

/// Convenience: build and run a simulation in one call.
pub fn simulate<S, F>(store: &S, eligible: F, config: SimulationConfig) -> Result<SimulationReport>
where
    S: SnapshotStore + ?Sized,
    F: Fn(&Asset) -> bool,
{
    Ok(Simulation::new(store, eligible, config)?.run())
}
