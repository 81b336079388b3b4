//! Backtest performance metrics over a simulated value trajectory.

use std::fmt;

use crate::simulation::SimulationReport;

/// Performance summary of a return series.
///
/// Returns are simple (not log). Annualization uses `periods_per_year`:
/// with daily snapshots sampled every `stride` days that is `365 / stride`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metrics {
    /// Cumulative return (0.15 = 15%)
    pub total_return: f64,
    /// Compound annual growth rate
    pub cagr: f64,
    /// Annualized sample standard deviation of returns
    pub volatility: f64,
    /// Annualized (mean - risk_free) / std dev
    pub sharpe: f64,
    /// Annualized (mean - risk_free) / downside deviation
    pub sortino: f64,
    /// Largest peak-to-trough loss, as a positive fraction
    pub max_drawdown: f64,
    /// CAGR / max drawdown
    pub calmar: f64,
    pub num_periods: usize,
    pub winning_periods: usize,
    pub losing_periods: usize,
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PERFORMANCE:")?;
        writeln!(f, "  Total return:    {:>8.2}%", self.total_return * 100.0)?;
        writeln!(f, "  CAGR:            {:>8.2}%", self.cagr * 100.0)?;
        writeln!(f, "  Volatility:      {:>8.2}%", self.volatility * 100.0)?;
        writeln!(f, "  Sharpe:          {:>8.2}", self.sharpe)?;
        writeln!(f, "  Sortino:         {:>8.2}", self.sortino)?;
        writeln!(f, "  Max drawdown:    {:>8.2}%", self.max_drawdown * 100.0)?;
        writeln!(f, "  Calmar:          {:>8.2}", self.calmar)?;
        writeln!(
            f,
            "  Win/Loss/Total:  {}/{}/{}",
            self.winning_periods, self.losing_periods, self.num_periods
        )
    }
}

/// Annualization factor for daily snapshots sampled every `stride` days.
pub fn periods_per_year(stride: usize) -> f64 {
    365.0 / stride.max(1) as f64
}

/// Metrics for the holding intervals of a simulation run.
///
/// `None` when fewer than two periods completed.
pub fn report_metrics(report: &SimulationReport, periods_per_year: f64) -> Option<Metrics> {
    compute_metrics(&report.returns(), periods_per_year, 0.0)
}

/// Compute metrics from periodic simple returns.
///
/// `risk_free` is per period. Returns `None` for an empty series.
pub fn compute_metrics(returns: &[f64], periods_per_year: f64, risk_free: f64) -> Option<Metrics> {
    if returns.is_empty() {
        return None;
    }
    let n = returns.len();

    let growth = returns.iter().fold(1.0_f64, |acc, &r| acc * (1.0 + r));
    let total_return = growth - 1.0;

    let years = n as f64 / periods_per_year;
    let cagr = if total_return <= -1.0 {
        -1.0
    } else if years > 0.0 {
        growth.powf(1.0 / years) - 1.0
    } else {
        0.0
    };

    let mean = returns.iter().sum::<f64>() / n as f64;
    let variance = sample_variance(returns.iter().map(|&r| r - mean), n);
    let downside_variance =
        sample_variance(returns.iter().map(|&r| (r - risk_free).min(0.0)), n);

    let excess_mean = mean - risk_free;
    let annualize = periods_per_year.sqrt();
    let volatility = variance.sqrt() * annualize;
    let sharpe = ratio(excess_mean * annualize, variance.sqrt());
    let sortino = ratio(excess_mean * annualize, downside_variance.sqrt());

    let max_drawdown = max_drawdown(returns);
    let calmar = ratio(cagr, max_drawdown);

    Some(Metrics {
        total_return,
        cagr,
        volatility,
        sharpe,
        sortino,
        max_drawdown,
        calmar,
        num_periods: n,
        winning_periods: returns.iter().filter(|&&r| r > 0.0).count(),
        losing_periods: returns.iter().filter(|&&r| r < 0.0).count(),
    })
}

/// Sum of squared deviations over `n - 1`; 0 for a single observation.
fn sample_variance(deviations: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    deviations.map(|d| d * d).sum::<f64>() / (n - 1) as f64
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

/// Largest peak-to-trough decline of the compounded return series.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut peak = 1.0_f64;
    let mut value = 1.0_f64;
    let mut worst = 0.0_f64;

    for &r in returns {
        value *= 1.0 + r;
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }

    worst
}
