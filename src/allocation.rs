//! Allocation target calculator: market-cap weights with an optional cap.
//!
//! Assets are ranked by market cap, the top `num` eligible ones form the
//! tradeable set, and each gets `market_cap / total_market_cap` as its target.
//! With a cap configured, weight above the cap is water-filled into the
//! remaining assets in proportion to their market caps.

use log::{debug, error, warn};
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use crate::types::{Asset, AssetId, RankedAsset};

/// How many assets to hold and how heavy any one of them may get.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocationConfig {
    /// Number of top-ranked eligible assets in the tradeable set
    pub num: usize,
    /// Maximum target weight per asset, in (0, 1]
    pub max_allocation: Option<f64>,
}

impl AllocationConfig {
    /// Uncapped config selecting the top `num` assets.
    pub fn new(num: usize) -> Self {
        Self {
            num,
            max_allocation: None,
        }
    }

    /// Cap every target weight at `max_allocation`.
    pub fn with_max_allocation(mut self, max_allocation: f64) -> Self {
        self.max_allocation = Some(max_allocation);
        self
    }

    /// Reject a cap that is non-finite or outside (0, 1].
    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.max_allocation {
            if !max.is_finite() || max <= 0.0 || max > 1.0 {
                return Err(Error::InvalidConfig(format!(
                    "max_allocation must be in (0.0, 1.0], got {max}"
                )));
            }
        }
        Ok(())
    }
}

/// Symbols excluded from the tradeable set.
///
/// Matching is case-insensitive on the asset symbol.
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    symbols: FxHashSet<String>,
}

impl Blacklist {
    /// Build from symbols in any case.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().to_uppercase())
                .collect(),
        }
    }

    /// True if `symbol` is listed, ignoring case.
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(&symbol.to_uppercase())
    }

    /// Eligibility predicate: true unless the asset's symbol is listed.
    pub fn allows(&self, asset: &Asset) -> bool {
        !self.contains(&asset.symbol)
    }
}

/// The tradeable set with target weights, in rank order.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetSet {
    ranked: Vec<RankedAsset>,
    total_market_cap: f64,
    rounds: usize,
}

impl TargetSet {
    /// Ranked assets, largest market cap first.
    pub fn ranked(&self) -> &[RankedAsset] {
        &self.ranked
    }

    /// Iterate in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &RankedAsset> {
        self.ranked.iter()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Target weight for `id`; 0 for assets outside the tradeable set.
    pub fn target_for(&self, id: &AssetId) -> f64 {
        self.ranked
            .iter()
            .find(|r| &r.asset.id == id)
            .map_or(0.0, |r| r.target_allocation)
    }

    pub fn contains(&self, id: &AssetId) -> bool {
        self.ranked.iter().any(|r| &r.asset.id == id)
    }

    /// Sum of target weights.
    pub fn total_allocation(&self) -> f64 {
        self.ranked.iter().map(|r| r.target_allocation).sum()
    }

    /// Sum of market caps across the tradeable set (before capping).
    pub fn total_market_cap(&self) -> f64 {
        self.total_market_cap
    }

    /// Capping rounds run (0 when uncapped or degenerate).
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// True when no valid targets exist (empty set or zero market cap).
    pub fn is_degenerate(&self) -> bool {
        self.total_allocation() == 0.0
    }
}

/// Rank assets by market cap (descending, stable) and take the first `num`
/// that pass `eligible`. The cash asset never ranks.
pub fn select_tradeable<'a, F>(assets: &'a [Asset], eligible: F, num: usize) -> Vec<&'a Asset>
where
    F: Fn(&Asset) -> bool,
{
    let mut sorted: Vec<&Asset> = assets.iter().collect();
    sorted.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap));
    sorted
        .into_iter()
        .filter(|&a| !a.is_cash() && eligible(a))
        .take(num)
        .collect()
}

/// Plain proportional split: `market_cap / total`.
///
/// Returns all zeros when the total is not positive.
pub fn proportional_weights(market_caps: &[f64]) -> Vec<f64> {
    let total: f64 = market_caps.iter().sum();
    if total <= 0.0 {
        return vec![0.0; market_caps.len()];
    }
    market_caps.iter().map(|&mc| mc / total).collect()
}

/// One water-filling round.
///
/// Every asset whose current weight is at or above `max` is pinned at `max`.
/// The residual `1 - pinned * max` is split across the other assets in
/// proportion to their market caps.
pub fn cap_round(market_caps: &[f64], weights: &[f64], max: f64) -> Vec<f64> {
    debug_assert_eq!(market_caps.len(), weights.len());

    let pinned: Vec<bool> = weights.iter().map(|&w| w >= max).collect();
    let pinned_count = pinned.iter().filter(|&&p| p).count();
    let residual = (1.0 - pinned_count as f64 * max).max(0.0);
    let free_cap: f64 = market_caps
        .iter()
        .zip(&pinned)
        .filter(|(_, p)| !**p)
        .map(|(mc, _)| mc)
        .sum();

    market_caps
        .iter()
        .zip(&pinned)
        .map(|(&mc, &p)| {
            if p {
                max
            } else if free_cap > 0.0 {
                residual * mc / free_cap
            } else {
                0.0
            }
        })
        .collect()
}

fn pinned_count(weights: &[f64], max: f64) -> usize {
    weights.iter().filter(|&&w| w >= max).count()
}

/// Run [`cap_round`] to a fixed point.
///
/// Returns the final weights and the number of rounds. Each round that does
/// not converge pins at least one more asset, so the loop needs at most
/// `market_caps.len()` rounds; `len + 1` is enforced as a hard bound.
pub fn capped_weights(market_caps: &[f64], max: f64) -> Result<(Vec<f64>, usize)> {
    let limit = market_caps.len() + 1;
    let mut weights = proportional_weights(market_caps);
    let mut rounds = 0;

    loop {
        if rounds >= limit {
            error!(
                "cap loop exceeded {limit} rounds for {} assets at max {max}",
                market_caps.len()
            );
            return Err(Error::NonConvergence {
                rounds,
                assets: market_caps.len(),
            });
        }

        let next = cap_round(market_caps, &weights, max);
        rounds += 1;

        let before = pinned_count(&weights, max);
        let after = pinned_count(&next, max);
        debug!("cap round {rounds}: {after}/{} assets pinned at {max}", market_caps.len());

        weights = next;
        if after == before {
            return Ok((weights, rounds));
        }
    }
}

/// Compute target weights for one snapshot.
///
/// A zero total market cap or an empty tradeable set is not an error: the
/// selected assets come back with zero targets and a warning is logged.
pub fn compute_targets<F>(
    snapshot: &Snapshot,
    eligible: F,
    config: &AllocationConfig,
) -> Result<TargetSet>
where
    F: Fn(&Asset) -> bool,
{
    config.validate()?;

    let selected = select_tradeable(snapshot.assets(), eligible, config.num);
    let market_caps: Vec<f64> = selected.iter().map(|a| a.market_cap).collect();
    let total_market_cap: f64 = market_caps.iter().sum();

    let (weights, rounds) = if total_market_cap <= 0.0 {
        warn!(
            "no valid targets: {} eligible assets with total market cap {total_market_cap}",
            selected.len()
        );
        (vec![0.0; selected.len()], 0)
    } else {
        match config.max_allocation {
            Some(max) => capped_weights(&market_caps, max)?,
            None => (proportional_weights(&market_caps), 0),
        }
    };

    let ranked = selected
        .into_iter()
        .zip(weights)
        .map(|(asset, target_allocation)| RankedAsset {
            asset: asset.clone(),
            target_allocation,
        })
        .collect();

    Ok(TargetSet {
        ranked,
        total_market_cap,
        rounds,
    })
}
