//! Property-based tests for allocation, diff, and replay invariants.
//!
//! These tests use proptest to verify that key invariants hold
//! across randomly generated snapshots and portfolios.

use capweight::allocation::capped_weights;
use capweight::{
    Action, AllocationConfig, Asset, AssetId, CashPolicy, Holdings, Snapshot, SnapshotHistory,
    SimulationConfig, apply_trades, compute_targets, compute_trades, simulate,
};
use proptest::prelude::*;

const EPS: f64 = 1e-9;

/// Generate a positive market cap spanning several orders of magnitude
fn market_cap_strategy() -> impl Strategy<Value = f64> {
    (1u32..=1_000_000u32).prop_map(|m| m as f64 * 1_000.0)
}

/// Generate a positive price
fn price_strategy() -> impl Strategy<Value = f64> {
    (1u32..=1_000_000u32).prop_map(|p| p as f64 / 100.0)
}

/// Generate a snapshot of 1..=30 distinct assets
fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    prop::collection::vec((price_strategy(), market_cap_strategy()), 1..=30).prop_map(|rows| {
        let assets = rows
            .into_iter()
            .enumerate()
            .map(|(i, (price, mc))| Asset::new(&format!("C{i}"), "Coin", price, mc))
            .collect();
        Snapshot::new(assets).unwrap()
    })
}

/// Generate a cap in (0, 1]
fn cap_strategy() -> impl Strategy<Value = f64> {
    (1u32..=100u32).prop_map(|c| c as f64 / 100.0)
}

fn relative_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // ALLOCATION INVARIANTS
    // ========================================================================

    /// Uncapped targets sum to exactly 1
    #[test]
    fn uncapped_targets_sum_to_one(snap in snapshot_strategy(), num in 1usize..=40) {
        let targets = compute_targets(&snap, |_| true, &AllocationConfig::new(num)).unwrap();
        prop_assert!(!targets.is_empty());
        prop_assert!((targets.total_allocation() - 1.0).abs() < EPS,
            "sum = {}", targets.total_allocation());
    }

    /// No capped weight exceeds the cap, and the loop stays within N rounds
    #[test]
    fn cap_respected_within_bound(
        caps in prop::collection::vec(market_cap_strategy(), 1..=40),
        max in cap_strategy(),
    ) {
        let (weights, rounds) = capped_weights(&caps, max).unwrap();
        prop_assert!(rounds <= caps.len().max(1), "rounds {} > {}", rounds, caps.len());
        for w in &weights {
            prop_assert!(*w <= max + EPS, "weight {} above cap {}", w, max);
            prop_assert!(*w >= 0.0);
        }

        let sum: f64 = weights.iter().sum();
        if caps.len() as f64 * max >= 1.0 {
            // Feasible: the cap binds without losing weight
            prop_assert!((sum - 1.0).abs() < 1e-6, "sum = {}", sum);
        } else {
            prop_assert!(sum <= 1.0 + EPS);
        }
    }

    /// Capping never reorders assets: bigger market cap, no smaller weight
    #[test]
    fn capping_preserves_rank(
        caps in prop::collection::vec(market_cap_strategy(), 2..=20),
        max in cap_strategy(),
    ) {
        let (weights, _) = capped_weights(&caps, max).unwrap();
        for i in 0..caps.len() {
            for j in 0..caps.len() {
                if caps[i] > caps[j] {
                    prop_assert!(weights[i] >= weights[j] - EPS);
                }
            }
        }
    }

    /// The tradeable set is the top N by market cap, in descending order
    #[test]
    fn tradeable_set_is_top_n(snap in snapshot_strategy(), num in 1usize..=40) {
        let targets = compute_targets(&snap, |_| true, &AllocationConfig::new(num)).unwrap();
        let tradeable = snap.assets().iter().filter(|a| !a.is_cash()).count();
        prop_assert_eq!(targets.len(), num.min(tradeable));

        let caps: Vec<f64> = targets.iter().map(|r| r.asset.market_cap).collect();
        prop_assert!(caps.windows(2).all(|w| w[0] >= w[1]));
        prop_assert!(targets.iter().all(|r| !r.asset.id.is_cash()));
    }

    // ========================================================================
    // DIFF INVARIANTS
    // ========================================================================

    /// Holdings disjoint from the tradeable set are each sold exactly once
    #[test]
    fn full_liquidation_coverage(
        snap in snapshot_strategy(),
        coins in prop::collection::vec(0u32..1000, 30),
    ) {
        // Target only the largest asset; hold everything else
        let targets = compute_targets(&snap, |_| true, &AllocationConfig::new(1)).unwrap();
        let mut holdings = Holdings::new(0.0);
        for (asset, &c) in snap.assets().iter().filter(|a| !a.is_cash()).zip(&coins) {
            if !targets.contains(&asset.id) {
                holdings.set_coins(asset.id.clone(), c as f64);
            }
        }

        let plan = compute_trades(&targets, &holdings, &snap).unwrap();
        for (id, c) in holdings.positions() {
            let matching: Vec<_> = plan.trades.iter().filter(|t| &t.id == id).collect();
            prop_assert_eq!(matching.len(), 1, "{} appears {} times", id, matching.len());
            prop_assert_eq!(matching[0].action, Action::Sell);
            prop_assert_eq!(matching[0].target_coins, 0.0);
            prop_assert_eq!(matching[0].current_coins, c);
        }
    }

    /// Every trade id is unique and no trade is for cash
    #[test]
    fn no_double_counting(
        snap in snapshot_strategy(),
        num in 1usize..=10,
        coins in prop::collection::vec(0u32..1000, 30),
        cash in 0u32..100_000,
    ) {
        let targets = compute_targets(&snap, |_| true, &AllocationConfig::new(num)).unwrap();
        let mut holdings = Holdings::new(cash as f64);
        for (asset, &c) in snap.assets().iter().filter(|a| !a.is_cash()).zip(&coins) {
            holdings.set_coins(asset.id.clone(), c as f64);
        }

        let plan = compute_trades(&targets, &holdings, &snap).unwrap();
        let mut ids: Vec<&AssetId> = plan.trades.iter().map(|t| &t.id).collect();
        ids.sort();
        let before = ids.len();
        ids.dedup();
        prop_assert_eq!(ids.len(), before);
        prop_assert!(plan.trades.iter().all(|t| !t.id.is_cash()));

        // One trade per targeted asset, plus one per uncovered nonzero holding
        let uncovered = holdings.positions().filter(|(id, _)| !targets.contains(id)).count();
        prop_assert_eq!(plan.len(), targets.len() + uncovered);
    }

    // ========================================================================
    // CONSERVATION INVARIANTS
    // ========================================================================

    /// Trading at one snapshot's prices neither creates nor destroys value
    #[test]
    fn monetary_conservation(
        snap in snapshot_strategy(),
        num in 1usize..=10,
        max in cap_strategy(),
        coins in prop::collection::vec(0u32..1000, 30),
        cash in 0u32..100_000,
    ) {
        let config = AllocationConfig::new(num).with_max_allocation(max);
        let targets = compute_targets(&snap, |_| true, &config).unwrap();
        let mut holdings = Holdings::new(cash as f64);
        for (asset, &c) in snap.assets().iter().filter(|a| !a.is_cash()).zip(&coins) {
            holdings.set_coins(asset.id.clone(), c as f64);
        }

        let plan = compute_trades(&targets, &holdings, &snap).unwrap();
        let pre = plan.account_value;
        prop_assert!(relative_eq(pre, holdings.total_value(&snap).unwrap()));

        let post = apply_trades(&mut holdings, &plan.trades, CashPolicy::NonNegative).unwrap();
        prop_assert!(relative_eq(pre, post), "pre {} != post {}", pre, post);
        prop_assert!(relative_eq(post, holdings.total_value(&snap).unwrap()));
        prop_assert!(holdings.cash() >= 0.0);
        prop_assert!(holdings.positions().all(|(_, c)| c >= 0.0));
    }

    /// A replay keeps every period's pre and post values equal and cash non-negative
    #[test]
    fn replay_conserves_per_period(
        snaps in prop::collection::vec(snapshot_strategy(), 1..=8),
        num in 1usize..=5,
        stride in 1usize..=3,
    ) {
        // Later periods may drop assets held earlier; keep the universe fixed
        let universe: Vec<&Asset> = snaps[0].assets().iter().filter(|a| !a.is_cash()).collect();
        let history: SnapshotHistory = snaps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let quotes: Vec<&Asset> = s.assets().iter().filter(|a| !a.is_cash()).collect();
                let assets = universe
                    .iter()
                    .zip(quotes.iter().cycle())
                    .map(|(u, q)| Asset { price: q.price, market_cap: q.market_cap, ..(*u).clone() })
                    .collect();
                (format!("2018-{:02}-01", i + 1), Snapshot::new(assets).unwrap())
            })
            .collect();

        let config = SimulationConfig::new(AllocationConfig::new(num), 1_000.0).with_stride(stride);
        let report = simulate(&history, |_| true, config).unwrap();

        prop_assert!(report.is_complete());
        prop_assert_eq!(report.periods.len(), snaps.len().div_ceil(stride));
        for p in &report.periods {
            prop_assert!(relative_eq(p.pre_trade_value, p.post_trade_value),
                "{}: pre {} != post {}", p.period, p.pre_trade_value, p.post_trade_value);
        }
        prop_assert!(report.final_holdings.cash() >= 0.0);
    }
}
