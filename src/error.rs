//! Error types for the rebalancing engine.

use crate::types::AssetId;

/// Errors returned by the allocation, diff, and simulation stages.
///
/// Degenerate inputs (zero total market cap, empty tradeable set) are not
/// errors: they yield an all-zero [`TargetSet`](crate::TargetSet) instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A snapshot failed validation (duplicate id, negative or non-finite values).
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A holding has negative or non-finite coins.
    #[error("invalid holding for {id}: {reason}")]
    InvalidHolding { id: AssetId, reason: String },

    /// The same asset id appears twice in a holdings list.
    #[error("duplicate holding: {0}")]
    DuplicateHolding(AssetId),

    /// A held, nonzero position has no price in the snapshot.
    #[error("no price for held asset {id}")]
    MissingPrice { id: AssetId },

    /// A SELL trade refers to an asset that is not held.
    #[error("no holding to sell for {id}")]
    MissingHolding { id: AssetId },

    /// The capping loop exceeded its round bound. Indicates a logic bug.
    #[error("allocation capping did not converge after {rounds} rounds ({assets} assets)")]
    NonConvergence { rounds: usize, assets: usize },
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
