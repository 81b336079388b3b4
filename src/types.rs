//! Core records: AssetId, Asset, RankedAsset, HoldingEntry, Trade, Action

use std::fmt;

/// Id of the synthetic cash asset.
pub const CASH_ID: &str = "usdusd";

/// Asset identifier: lowercase `symbol + name`, unique within a snapshot.
///
/// `AssetId::new("BTC")` keeps the string as given; use [`AssetId::from_parts`]
/// to derive the canonical id from a symbol and name.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonical id: `(symbol + name).to_lowercase()`.
    pub fn from_parts(symbol: &str, name: &str) -> Self {
        Self(format!("{symbol}{name}").to_lowercase())
    }

    /// The cash id, `usdusd`.
    pub fn cash() -> Self {
        Self(CASH_ID.to_string())
    }

    #[inline]
    pub fn is_cash(&self) -> bool {
        self.0 == CASH_ID
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One asset of a market snapshot.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Asset {
    pub id: AssetId,
    pub symbol: String,
    pub name: String,
    /// Price in the quote currency (USD)
    pub price: f64,
    /// Market capitalization in the quote currency
    pub market_cap: f64,
}

impl Asset {
    /// Build an asset, deriving its id from symbol and name.
    pub fn new(symbol: &str, name: &str, price: f64, market_cap: f64) -> Self {
        Self {
            id: AssetId::from_parts(symbol, name),
            symbol: symbol.to_string(),
            name: name.to_string(),
            price,
            market_cap,
        }
    }

    /// The synthetic cash asset: price 1, market cap 0.
    pub fn cash() -> Self {
        Self {
            id: AssetId::cash(),
            symbol: "USD".to_string(),
            name: "USD".to_string(),
            price: 1.0,
            market_cap: 0.0,
        }
    }

    #[inline]
    pub fn is_cash(&self) -> bool {
        self.id.is_cash()
    }
}

/// An asset selected into the tradeable set, with its target weight.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedAsset {
    pub asset: Asset,
    /// Fraction of account value to hold in this asset, in [0, 1]
    pub target_allocation: f64,
}

/// One entry of the investor's holdings contract.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoldingEntry {
    pub id: AssetId,
    pub coins: f64,
}

impl HoldingEntry {
    pub fn new(id: impl Into<AssetId>, coins: f64) -> Self {
        Self {
            id: id.into(),
            coins,
        }
    }
}

/// Trade direction produced by the diff generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Action {
    Buy,
    Sell,
    Hold,
    /// Not held and zero target: nothing to do.
    None,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
            Action::None => write!(f, "NONE"),
        }
    }
}

/// A single rebalance instruction for one asset.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trade {
    pub id: AssetId,
    pub symbol: String,
    pub name: String,
    pub target_allocation: f64,
    pub current_allocation: f64,
    pub target_coins: f64,
    pub current_coins: f64,
    pub action: Action,
    pub price: f64,
}

impl Trade {
    /// Coins to acquire (positive) or dispose of (negative).
    #[inline]
    pub fn coin_delta(&self) -> f64 {
        self.target_coins - self.current_coins
    }

    /// Signed quote-currency amount of the trade.
    #[inline]
    pub fn amount(&self) -> f64 {
        self.coin_delta() * self.price
    }

    /// Absolute quote-currency amount.
    #[inline]
    pub fn notional(&self) -> f64 {
        self.amount().abs()
    }

    /// Quote-currency value at target.
    #[inline]
    pub fn target_value(&self) -> f64 {
        self.target_coins * self.price
    }

    /// Quote-currency value currently held.
    #[inline]
    pub fn current_value(&self) -> f64 {
        self.current_coins * self.price
    }

    /// True if applying the trade would not change the holding.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.coin_delta() == 0.0
    }
}
