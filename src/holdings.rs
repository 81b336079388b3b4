//! Investor holdings: cash plus coin counts per asset.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use crate::types::{AssetId, HoldingEntry};

/// Current holdings: a cash balance and non-cash coin counts keyed by id.
///
/// Positions with zero coins are not stored. Coins are never negative once a
/// set of trades has been applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Holdings {
    /// Cash balance in the quote currency (the `usdusd` holding)
    cash: f64,
    /// Non-cash coins indexed by asset id
    coins: FxHashMap<AssetId, f64>,
}

impl Holdings {
    /// Holdings consisting only of `cash`.
    pub fn new(cash: f64) -> Self {
        debug_assert!(cash >= 0.0, "cash must be non-negative, got {cash}");
        Self {
            cash,
            coins: FxHashMap::default(),
        }
    }

    /// Build holdings from the holdings contract.
    ///
    /// An entry with id `usdusd` sets the cash balance. Each id may appear at
    /// most once, and coins must be finite and non-negative.
    pub fn from_entries(entries: impl IntoIterator<Item = HoldingEntry>) -> Result<Self> {
        let mut holdings = Self::default();
        let mut seen = FxHashSet::default();

        for entry in entries {
            if !entry.coins.is_finite() || entry.coins < 0.0 {
                return Err(Error::InvalidHolding {
                    reason: format!("coins must be finite and >= 0, got {}", entry.coins),
                    id: entry.id,
                });
            }
            if !seen.insert(entry.id.clone()) {
                return Err(Error::DuplicateHolding(entry.id));
            }
            holdings.set_coins(entry.id, entry.coins);
        }

        Ok(holdings)
    }

    // === Queries ===

    /// Cash balance.
    #[inline]
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Coins held for `id`; the cash id returns the cash balance.
    pub fn coins(&self, id: &AssetId) -> f64 {
        if id.is_cash() {
            self.cash
        } else {
            self.coins.get(id).copied().unwrap_or(0.0)
        }
    }

    /// True if a non-cash position exists for `id`.
    pub fn holds(&self, id: &AssetId) -> bool {
        self.coins.contains_key(id)
    }

    /// Iterator over non-cash positions.
    pub fn positions(&self) -> impl Iterator<Item = (&AssetId, f64)> {
        self.coins.iter().map(|(id, &c)| (id, c))
    }

    /// Number of non-cash positions.
    pub fn len(&self) -> usize {
        self.coins.len()
    }

    /// True when no non-cash position is held.
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// The holdings contract view: cash first, then positions sorted by id.
    pub fn entries(&self) -> Vec<HoldingEntry> {
        let mut positions: Vec<HoldingEntry> = self
            .coins
            .iter()
            .map(|(id, &coins)| HoldingEntry::new(id.clone(), coins))
            .collect();
        positions.sort_by(|a, b| a.id.cmp(&b.id));

        let mut entries = Vec::with_capacity(positions.len() + 1);
        entries.push(HoldingEntry::new(AssetId::cash(), self.cash));
        entries.extend(positions);
        entries
    }

    /// Total account value: cash + sum of `coins * price` over positions.
    ///
    /// Prices come from the full snapshot. A held position that the snapshot
    /// does not list cannot be valued and returns [`Error::MissingPrice`].
    pub fn total_value(&self, snapshot: &Snapshot) -> Result<f64> {
        let mut total = self.cash;
        for (id, &coins) in &self.coins {
            if coins == 0.0 {
                continue;
            }
            let price = snapshot
                .price(id)
                .ok_or_else(|| Error::MissingPrice { id: id.clone() })?;
            total += coins * price;
        }
        Ok(total)
    }

    // === Mutation ===

    /// Set the coins for `id`. Zero removes the position; the cash id sets cash.
    pub fn set_coins(&mut self, id: AssetId, coins: f64) {
        if id.is_cash() {
            self.cash = coins;
        } else if coins == 0.0 {
            self.coins.remove(&id);
        } else {
            self.coins.insert(id, coins);
        }
    }

    /// Add `delta` (possibly negative) to the cash balance.
    #[inline]
    pub fn adjust_cash(&mut self, delta: f64) {
        self.cash += delta;
    }
}
