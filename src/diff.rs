//! CURRENT→TARGET diff engine.
//!
//! Reconciles current holdings against a [`TargetSet`] and produces one
//! [`Trade`] per asset that is either targeted or held. Holdings outside the
//! tradeable set are force-liquidated so no position is left orphaned.

use rustc_hash::FxHashSet;

use crate::allocation::TargetSet;
use crate::error::{Error, Result};
use crate::holdings::Holdings;
use crate::snapshot::Snapshot;
use crate::types::{Action, AssetId, Trade};

/// Output of one diff: the trades and the account value they were sized against.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradePlan {
    /// Tradeable-set trades in rank order, then forced exits sorted by id
    pub trades: Vec<Trade>,
    /// Pre-trade account value (cash + positions at snapshot prices)
    pub account_value: f64,
    /// Index into `trades` where the forced exits start
    pub exits_from: usize,
}

impl TradePlan {
    /// Trades that change a holding (nonzero coin delta).
    pub fn actionable(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| !t.is_noop())
    }

    /// Trades with the given action.
    pub fn by_action(&self, action: Action) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(move |t| t.action == action)
    }

    /// Trades for held assets outside the tradeable set.
    pub fn forced_exits(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().skip(self.exits_from)
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

/// Total account value of `holdings` at `snapshot` prices.
///
/// Fails with [`Error::MissingPrice`] if a held position is not listed.
pub fn account_value(holdings: &Holdings, snapshot: &Snapshot) -> Result<f64> {
    holdings.total_value(snapshot)
}

/// Compute the trades that move `holdings` to `targets`.
///
/// `snapshot` is the full snapshot the targets were computed from; it prices
/// holdings that fell out of the tradeable set. A degenerate target set
/// leaves held tradeable assets at HOLD; holdings outside the set are still
/// liquidated.
pub fn compute_trades(
    targets: &TargetSet,
    holdings: &Holdings,
    snapshot: &Snapshot,
) -> Result<TradePlan> {
    let account_value = holdings.total_value(snapshot)?;
    let allocation_of = |coins: f64, price: f64| {
        if account_value > 0.0 {
            coins * price / account_value
        } else {
            0.0
        }
    };

    let degenerate = targets.is_degenerate();
    let mut covered: FxHashSet<&AssetId> = FxHashSet::default();
    let mut trades = Vec::with_capacity(targets.len() + holdings.len());

    // 1. Every asset in the tradeable set
    for ranked in targets.iter() {
        let asset = &ranked.asset;
        let target_allocation = ranked.target_allocation;
        let mut target_coins = if asset.price > 0.0 {
            target_allocation * account_value / asset.price
        } else {
            0.0
        };

        let (current_coins, action) = if holdings.holds(&asset.id) {
            covered.insert(&asset.id);
            let coins = holdings.coins(&asset.id);
            // No valid targets: keep the position rather than sell to zero
            if degenerate {
                target_coins = coins;
            }
            (coins, classify_trade(coins, target_coins))
        } else if target_allocation > 0.0 {
            (0.0, Action::Buy)
        } else {
            (0.0, Action::None)
        };

        trades.push(Trade {
            id: asset.id.clone(),
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
            target_allocation,
            current_allocation: allocation_of(current_coins, asset.price),
            target_coins,
            current_coins,
            action,
            price: asset.price,
        });
    }

    // 2. Liquidate everything held but not covered
    let exits_from = trades.len();
    let mut exits: Vec<(&AssetId, f64)> = holdings
        .positions()
        .filter(|(id, coins)| *coins != 0.0 && !covered.contains(id))
        .collect();
    exits.sort_by(|a, b| a.0.cmp(b.0));

    for (id, coins) in exits {
        let asset = snapshot
            .get(id)
            .ok_or_else(|| Error::MissingPrice { id: id.clone() })?;
        trades.push(Trade {
            id: id.clone(),
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
            target_allocation: 0.0,
            current_allocation: allocation_of(coins, asset.price),
            target_coins: 0.0,
            current_coins: coins,
            action: Action::Sell,
            price: asset.price,
        });
    }

    Ok(TradePlan {
        trades,
        account_value,
        exits_from,
    })
}

/// BUY below target, SELL above, HOLD at target.
fn classify_trade(current_coins: f64, target_coins: f64) -> Action {
    if current_coins < target_coins {
        Action::Buy
    } else if current_coins > target_coins {
        Action::Sell
    } else {
        Action::Hold
    }
}
