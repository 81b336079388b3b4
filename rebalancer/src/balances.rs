//! Balance-export CSV import.
//!
//! The export has one row per currency with at least `Currency` and `Amount`
//! columns. The currency string, lowercased, is the asset id; the exchange's
//! dollar row (`USDUS Dollar`) maps to the cash id.

use std::io::Read;
use std::path::Path;

use capweight::{AssetId, HoldingEntry, Holdings};
use csv::{ReaderBuilder, Trim};
use log::debug;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Currency string the exchange export uses for US dollars.
const EXPORT_DOLLAR: &str = "usdus dollar";

#[derive(Debug, Deserialize)]
struct BalanceRow {
    #[serde(rename = "Currency")]
    currency: String,
    #[serde(rename = "Amount")]
    amount: f64,
}

/// Asset id for a `Currency` cell.
pub fn balance_id(currency: &str) -> AssetId {
    let id = currency.trim().to_lowercase();
    if id == EXPORT_DOLLAR {
        AssetId::cash()
    } else {
        AssetId::new(id)
    }
}

/// Read holdings from a balance export file.
pub fn load_balances(path: &Path, percent_in_play: f64) -> Result<Holdings> {
    let file = std::fs::File::open(path).map_err(|e| Error::BalancesRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_balances(file, percent_in_play)
}

/// Parse a balance export.
///
/// Every amount is scaled by `percent_in_play`. Rows for the same id are
/// summed. Rows with an empty currency are skipped.
pub fn parse_balances<R: Read>(reader: R, percent_in_play: f64) -> Result<Holdings> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut totals: FxHashMap<AssetId, f64> = FxHashMap::default();
    let mut order = Vec::new();

    for row in reader.deserialize() {
        let row: BalanceRow = row?;
        if row.currency.is_empty() {
            continue;
        }
        if !row.amount.is_finite() || row.amount < 0.0 {
            return Err(Error::Balances(format!(
                "{}: amount must be finite and >= 0, got {}",
                row.currency, row.amount
            )));
        }

        let id = balance_id(&row.currency);
        let coins = row.amount * percent_in_play;
        match totals.get_mut(&id) {
            Some(total) => *total += coins,
            None => {
                order.push(id.clone());
                totals.insert(id, coins);
            }
        }
    }

    debug!("imported {} balances", order.len());
    let entries = order.into_iter().map(|id| {
        let coins = totals.get(&id).copied().unwrap_or(0.0);
        HoldingEntry::new(id, coins)
    });
    Ok(Holdings::from_entries(entries)?)
}
