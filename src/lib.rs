//! # capweight
//!
//! A market-cap weighted portfolio rebalancing engine with per-asset caps and
//! deterministic historical replay.
//!
//! ## Pipeline
//!
//! - **Targets**: rank a [`Snapshot`] by market cap, keep the top `num`
//!   eligible assets, weight them by market cap, and water-fill any weight
//!   above `max_allocation` into the rest ([`compute_targets`]).
//! - **Trades**: diff current [`Holdings`] against the targets, producing one
//!   BUY / SELL / HOLD / NONE [`Trade`] per asset, plus forced SELLs for
//!   holdings that left the tradeable set ([`compute_trades`]).
//! - **Replay**: walk a [`SnapshotStore`] period by period, apply the trades
//!   to a running portfolio, and record the account value ([`Simulation`]).
//!
//! ## Quick Start
//!
//! ```
//! use capweight::{AllocationConfig, Asset, Holdings, Snapshot, compute_targets, compute_trades};
//!
//! let snapshot = Snapshot::new(vec![
//!     Asset::new("AAA", "Alpha", 10.0, 600.0),
//!     Asset::new("BBB", "Beta", 5.0, 400.0),
//! ])
//! .unwrap();
//!
//! let targets = compute_targets(&snapshot, |_| true, &AllocationConfig::new(2)).unwrap();
//! let plan = compute_trades(&targets, &Holdings::new(100.0), &snapshot).unwrap();
//!
//! assert_eq!(plan.account_value, 100.0);
//! assert_eq!(plan.trades.len(), 2);
//! assert!((plan.trades[0].target_coins - 6.0).abs() < 1e-9);  // $60 of Alpha at $10
//! assert!((plan.trades[1].target_coins - 8.0).abs() < 1e-9);  // $40 of Beta at $5
//! ```
//!
//! ## Capping
//!
//! ```
//! use capweight::allocation::capped_weights;
//!
//! // 60/30/10 with a 50% cap: the excess 10% flows to the other two pro rata
//! let (weights, rounds) = capped_weights(&[600.0, 300.0, 100.0], 0.5).unwrap();
//! assert_eq!(weights, vec![0.5, 0.375, 0.125]);
//! assert_eq!(rounds, 1);
//! ```
//!
//! ## Replay
//!
//! ```
//! use capweight::{AllocationConfig, Asset, SimulationConfig, Snapshot, SnapshotHistory, simulate};
//!
//! let mut history = SnapshotHistory::new();
//! history.insert("2018-01-01", Snapshot::new(vec![Asset::new("AAA", "Alpha", 10.0, 1.0)]).unwrap());
//! history.insert("2018-01-02", Snapshot::new(vec![Asset::new("AAA", "Alpha", 20.0, 1.0)]).unwrap());
//!
//! let config = SimulationConfig::new(AllocationConfig::new(1), 100.0).with_stride(1);
//! let report = simulate(&history, |_| true, config).unwrap();
//!
//! assert!(report.is_complete());
//! assert_eq!(report.values(), vec![100.0, 200.0]);
//! ```

pub mod allocation;
pub mod diff;
mod error;
mod holdings;
pub mod metrics;
#[cfg(feature = "persistence")]
pub mod persistence;
pub mod simulation;
mod snapshot;
mod types;

// Re-export public API
pub use allocation::{AllocationConfig, Blacklist, TargetSet, compute_targets};
pub use diff::{TradePlan, account_value, compute_trades};
pub use error::{Error, Result};
pub use holdings::Holdings;
pub use metrics::{Metrics, compute_metrics};
pub use simulation::{
    CashPolicy, PeriodReport, Simulation, SimulationAbort, SimulationConfig, SimulationPhase,
    SimulationReport, apply_trades, simulate,
};
pub use snapshot::{Snapshot, SnapshotHistory, SnapshotStore};
pub use types::{Action, Asset, AssetId, CASH_ID, HoldingEntry, RankedAsset, Trade};
