//! Market snapshots and the snapshot store interface.
//!
//! A [`Snapshot`] is the set of assets observed at one point in time. The
//! simulation driver reads snapshots through the [`SnapshotStore`] trait, so
//! callers decide where they come from (a cache directory, a test fixture).
//! [`SnapshotHistory`] is the in-memory store.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::types::{Asset, AssetId};

/// All assets observed at one point in time, indexed by id.
///
/// Always contains the cash asset (`usdusd`, price 1).
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    assets: Vec<Asset>,
    index: FxHashMap<AssetId, usize>,
}

impl Snapshot {
    /// Build a validated snapshot.
    ///
    /// Rejects duplicate ids and negative or non-finite price / market cap.
    /// Inserts the cash asset first if it is missing.
    pub fn new(assets: Vec<Asset>) -> Result<Self> {
        let mut all = Vec::with_capacity(assets.len() + 1);
        if !assets.iter().any(Asset::is_cash) {
            all.push(Asset::cash());
        }
        all.extend(assets);

        let mut index = FxHashMap::default();
        for (i, asset) in all.iter().enumerate() {
            if !asset.price.is_finite() || asset.price < 0.0 {
                return Err(Error::InvalidSnapshot(format!(
                    "{} has invalid price {}",
                    asset.id, asset.price
                )));
            }
            if !asset.market_cap.is_finite() || asset.market_cap < 0.0 {
                return Err(Error::InvalidSnapshot(format!(
                    "{} has invalid market cap {}",
                    asset.id, asset.market_cap
                )));
            }
            if index.insert(asset.id.clone(), i).is_some() {
                return Err(Error::InvalidSnapshot(format!("duplicate asset id {}", asset.id)));
            }
        }

        Ok(Self { assets: all, index })
    }

    /// Assets in insertion order (cash first when it was synthesized).
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Look up an asset by id.
    pub fn get(&self, id: &AssetId) -> Option<&Asset> {
        self.index.get(id).map(|&i| &self.assets[i])
    }

    /// Price of `id`, if the snapshot lists it.
    pub fn price(&self, id: &AssetId) -> Option<f64> {
        self.get(id).map(|a| a.price)
    }

    /// True if the snapshot lists `id`.
    pub fn contains(&self, id: &AssetId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of assets, including cash.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Read access to an ordered series of snapshots.
pub trait SnapshotStore {
    /// Period ids (ISO dates) in ascending order.
    fn periods(&self) -> Vec<&str>;

    /// The snapshot recorded for `period`.
    fn snapshot(&self, period: &str) -> Option<&Snapshot>;
}

/// In-memory snapshot store keyed by period id.
///
/// Period ids sort lexicographically, which matches chronological order for
/// ISO dates (`2018-01-07`, `20180107`).
#[derive(Clone, Debug, Default)]
pub struct SnapshotHistory {
    snapshots: BTreeMap<String, Snapshot>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the snapshot for `period`.
    pub fn insert(&mut self, period: impl Into<String>, snapshot: Snapshot) -> Option<Snapshot> {
        self.snapshots.insert(period.into(), snapshot)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// The most recent period and its snapshot.
    pub fn latest(&self) -> Option<(&str, &Snapshot)> {
        self.snapshots
            .iter()
            .next_back()
            .map(|(p, s)| (p.as_str(), s))
    }

    /// A copy restricted to periods within `[from, to]` (either bound optional).
    pub fn between(&self, from: Option<&str>, to: Option<&str>) -> Self {
        let snapshots = self
            .snapshots
            .iter()
            .filter(|(p, _)| from.is_none_or(|f| p.as_str() >= f))
            .filter(|(p, _)| to.is_none_or(|t| p.as_str() <= t))
            .map(|(p, s)| (p.clone(), s.clone()))
            .collect();
        Self { snapshots }
    }
}

impl SnapshotStore for SnapshotHistory {
    fn periods(&self) -> Vec<&str> {
        self.snapshots.keys().map(String::as_str).collect()
    }

    fn snapshot(&self, period: &str) -> Option<&Snapshot> {
        self.snapshots.get(period)
    }
}

impl FromIterator<(String, Snapshot)> for SnapshotHistory {
    fn from_iter<I: IntoIterator<Item = (String, Snapshot)>>(iter: I) -> Self {
        Self {
            snapshots: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Asset {
        Asset::new("BTC", "Bitcoin", 10_000.0, 170e9)
    }

    #[test]
    fn inserts_cash_when_missing() {
        let snap = Snapshot::new(vec![btc()]).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.price(&AssetId::cash()), Some(1.0));
        assert_eq!(snap.assets()[0].id, AssetId::cash());
    }

    #[test]
    fn keeps_existing_cash() {
        let snap = Snapshot::new(vec![Asset::cash(), btc()]).unwrap();
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = Snapshot::new(vec![btc(), btc()]);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn rejects_negative_price() {
        let bad = Asset::new("BAD", "Bad", -1.0, 10.0);
        assert!(Snapshot::new(vec![bad]).is_err());
    }

    #[test]
    fn rejects_nan_market_cap() {
        let bad = Asset::new("BAD", "Bad", 1.0, f64::NAN);
        assert!(Snapshot::new(vec![bad]).is_err());
    }

    #[test]
    fn lookup_by_id() {
        let snap = Snapshot::new(vec![btc()]).unwrap();
        let id = AssetId::new("btcbitcoin");
        assert!(snap.contains(&id));
        assert_eq!(snap.get(&id).unwrap().symbol, "BTC");
        assert_eq!(snap.price(&AssetId::new("nope")), None);
    }

    #[test]
    fn history_orders_periods() {
        let mut history = SnapshotHistory::new();
        history.insert("20180301", Snapshot::default());
        history.insert("20180101", Snapshot::default());
        history.insert("20180201", Snapshot::default());

        assert_eq!(history.periods(), vec!["20180101", "20180201", "20180301"]);
        assert_eq!(history.latest().unwrap().0, "20180301");
    }

    #[test]
    fn history_between_bounds() {
        let history: SnapshotHistory = ["20180101", "20180201", "20180301", "20180401"]
            .into_iter()
            .map(|p| (p.to_string(), Snapshot::default()))
            .collect();

        let window = history.between(Some("20180201"), Some("20180301"));
        assert_eq!(window.periods(), vec!["20180201", "20180301"]);

        let open = history.between(None, Some("20180101"));
        assert_eq!(open.len(), 1);
    }
}
