//! Error types for the rebalancer.

use std::path::PathBuf;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("balances error: {0}")]
    Balances(String),

    #[error("failed to read balances file {path}: {source}")]
    BalancesRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse balances CSV: {0}")]
    BalancesParse(#[from] csv::Error),

    #[error("failed to load snapshot data from {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid date {0:?}: expected YYYY-MM-DD or YYYYMMDD")]
    Date(String),

    #[error(transparent)]
    Engine(#[from] capweight::Error),

    #[error("simulation aborted at {period}: {source}")]
    SimulationAborted {
        period: String,
        source: capweight::Error,
    },

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
