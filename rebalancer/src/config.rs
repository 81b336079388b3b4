//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use capweight::persistence::{self, LATEST};
use capweight::{AllocationConfig, Blacklist, CashPolicy, SimulationConfig};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub holdings: HoldingsConfig,
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Number of top-ranked eligible assets to hold
    #[serde(default = "default_num")]
    pub num: usize,
    /// Per-asset weight cap; 1.0 leaves weights uncapped
    #[serde(default = "default_max_allocation")]
    pub max_allocation: f64,
    /// Symbols never bought
    #[serde(default = "default_blacklist")]
    pub blacklist: Vec<String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            num: default_num(),
            max_allocation: default_max_allocation(),
            blacklist: default_blacklist(),
        }
    }
}

fn default_num() -> usize {
    7
}
fn default_max_allocation() -> f64 {
    0.5
}
fn default_blacklist() -> Vec<String> {
    ["BTC", "BCH", "ETC", "MIOTA", "USD"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldingsConfig {
    /// Fraction of every exported balance that the plan may trade
    #[serde(default = "default_percent_in_play")]
    pub percent_in_play: f64,
}

impl Default for HoldingsConfig {
    fn default() -> Self {
        Self {
            percent_in_play: default_percent_in_play(),
        }
    }
}

fn default_percent_in_play() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_starting_cash")]
    pub starting_cash: f64,
    /// Rebalance on every `stride`-th cached snapshot
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default)]
    pub allow_negative_cash: bool,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            stride: default_stride(),
            allow_negative_cash: false,
        }
    }
}

fn default_starting_cash() -> f64 {
    100.0
}
fn default_stride() -> usize {
    capweight::simulation::DEFAULT_STRIDE
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Directory holding `marketCaps-<period>.json` snapshot files
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

fn default_snapshot_dir() -> String {
    "./cache".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate config from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.strategy.num == 0 {
            return Err(Error::Config("strategy.num must be >= 1".into()));
        }
        self.allocation()
            .validate()
            .map_err(|e| section_error("strategy", e))?;
        let pct = self.holdings.percent_in_play;
        if !pct.is_finite() || pct <= 0.0 || pct > 1.0 {
            return Err(Error::Config(
                "holdings.percent_in_play must be in (0.0, 1.0]".into(),
            ));
        }
        self.simulation_config()
            .validate()
            .map_err(|e| section_error("simulation", e))?;
        if self.data.snapshot_dir.is_empty() {
            return Err(Error::Config("data.snapshot_dir must not be empty".into()));
        }
        Ok(())
    }

    /// Allocation settings for the engine.
    pub fn allocation(&self) -> AllocationConfig {
        AllocationConfig::new(self.strategy.num).with_max_allocation(self.strategy.max_allocation)
    }

    /// Eligibility filter built from the configured blacklist.
    pub fn blacklist(&self) -> Blacklist {
        Blacklist::new(&self.strategy.blacklist)
    }

    /// Replay settings for the engine.
    pub fn simulation_config(&self) -> SimulationConfig {
        let policy = if self.simulation.allow_negative_cash {
            CashPolicy::AllowNegative
        } else {
            CashPolicy::NonNegative
        };
        SimulationConfig::new(self.allocation(), self.simulation.starting_cash)
            .with_stride(self.simulation.stride)
            .with_cash_policy(policy)
    }

    pub fn snapshot_dir(&self) -> &Path {
        Path::new(&self.data.snapshot_dir)
    }

    /// Cache file of the live snapshot.
    pub fn latest_snapshot_path(&self) -> PathBuf {
        persistence::snapshot_path(self.snapshot_dir(), LATEST)
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}

/// Prefix an engine validation message with its config section.
fn section_error(section: &str, e: capweight::Error) -> Error {
    match e {
        capweight::Error::InvalidConfig(msg) => Error::Config(format!("{section}.{msg}")),
        other => Error::Engine(other),
    }
}
