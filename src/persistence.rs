//! File-based snapshot cache.
//!
//! Each snapshot is stored as one JSON file, `marketCaps-<period>.json`,
//! shaped as `{"marketCaps": [{"id", "name", "symbol", "marketCap", "price"}]}`.
//! The newest live snapshot uses the period key `latest`.
//!
//! # Usage
//!
//! ```ignore
//! use capweight::persistence;
//! use std::path::Path;
//!
//! let history = persistence::load_history(Path::new("cache")).unwrap();
//! let latest = persistence::load_snapshot(&persistence::snapshot_path(Path::new("cache"), "latest")).unwrap();
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::snapshot::{Snapshot, SnapshotHistory, SnapshotStore};
use crate::types::Asset;

/// Period key of the live (non-historical) snapshot.
pub const LATEST: &str = "latest";

const PREFIX: &str = "marketCaps-";
const SUFFIX: &str = ".json";

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(rename = "marketCaps")]
    market_caps: Vec<Asset>,
}

/// Cache file path for `period` inside `dir`.
pub fn snapshot_path(dir: &Path, period: &str) -> PathBuf {
    dir.join(format!("{PREFIX}{period}{SUFFIX}"))
}

/// Period key encoded in a cache file name, if it is one.
pub fn period_of(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(PREFIX)?
        .strip_suffix(SUFFIX)
        .filter(|p| !p.is_empty())
}

/// Write one snapshot as pretty-printed JSON.
pub fn save_snapshot(snapshot: &Snapshot, path: &Path) -> io::Result<()> {
    let file = SnapshotFile {
        market_caps: snapshot.assets().to_vec(),
    };
    let json = serde_json::to_string_pretty(&file).map_err(io::Error::other)?;

    let mut writer = io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(writer, "{json}")?;
    writer.flush()
}

/// Read and validate one snapshot file.
pub fn load_snapshot(path: &Path) -> io::Result<Snapshot> {
    let contents = std::fs::read_to_string(path)?;
    let file: SnapshotFile = serde_json::from_str(&contents).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: {e}", path.display()),
        )
    })?;
    Snapshot::new(file.market_caps).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: {e}", path.display()),
        )
    })
}

/// Load every historical snapshot in `dir` (the `latest` file is skipped).
pub fn load_history(dir: &Path) -> io::Result<SnapshotHistory> {
    let mut history = SnapshotHistory::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(period) = name.to_str().and_then(period_of) else {
            continue;
        };
        if period == LATEST {
            continue;
        }
        history.insert(period, load_snapshot(&entry.path())?);
    }

    Ok(history)
}

/// Write every snapshot of `history` into `dir`, creating it if needed.
pub fn save_history(history: &SnapshotHistory, dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for period in history.periods() {
        if let Some(snapshot) = history.snapshot(period) {
            save_snapshot(snapshot, &snapshot_path(dir, period))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetId;

    fn sample() -> Snapshot {
        Snapshot::new(vec![
            Asset::new("ETH", "Ethereum", 1100.0, 106e9),
            Asset::new("XRP", "Ripple", 2.3, 89e9),
        ])
        .unwrap()
    }

    #[test]
    fn period_from_file_name() {
        assert_eq!(period_of("marketCaps-20180107.json"), Some("20180107"));
        assert_eq!(period_of("marketCaps-latest.json"), Some("latest"));
        assert_eq!(period_of("marketCaps-.json"), None);
        assert_eq!(period_of("notes.txt"), None);
    }

    #[test]
    fn save_and_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(dir.path(), "20180107");

        save_snapshot(&sample(), &path).unwrap();
        let loaded = load_snapshot(&path).unwrap();

        assert_eq!(loaded.assets(), sample().assets());
        assert_eq!(loaded.price(&AssetId::new("xrpripple")), Some(2.3));
    }

    #[test]
    fn reads_camel_case_cache_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marketCaps-20180114.json");
        std::fs::write(
            &path,
            r#"{"marketCaps": [
                {"id": "usdusd", "name": "USD", "symbol": "USD", "marketCap": 0, "price": 1},
                {"id": "btcbitcoin", "name": "Bitcoin", "symbol": "BTC", "marketCap": 236000000000, "price": 14000}
            ]}"#,
        )
        .unwrap();

        let snap = load_snapshot(&path).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get(&AssetId::new("btcbitcoin")).unwrap().market_cap, 236e9);
    }

    #[test]
    fn invalid_snapshot_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marketCaps-bad.json");
        std::fs::write(
            &path,
            r#"{"marketCaps": [
                {"id": "a", "name": "A", "symbol": "A", "marketCap": 1, "price": 1},
                {"id": "a", "name": "A", "symbol": "A", "marketCap": 1, "price": 1}
            ]}"#,
        )
        .unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn history_round_trip_skips_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = SnapshotHistory::new();
        history.insert("20180107", sample());
        history.insert("20180114", sample());
        save_history(&history, dir.path()).unwrap();
        save_snapshot(&sample(), &snapshot_path(dir.path(), LATEST)).unwrap();
        std::fs::write(dir.path().join("README"), "not a snapshot").unwrap();

        let loaded = load_history(dir.path()).unwrap();
        assert_eq!(loaded.periods(), vec!["20180107", "20180114"]);
    }

    #[test]
    fn missing_file_is_error() {
        assert!(load_snapshot(Path::new("does-not-exist.json")).is_err());
    }
}
