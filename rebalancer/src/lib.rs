//! capweight-rebalancer: operator tool for the capweight engine.
//!
//! Reads a balance export and the cached market-cap snapshots, computes the
//! capped market-cap targets and the trades that reach them, replays the
//! strategy over history, and appends every run to a JSONL audit trail.

pub mod audit;
pub mod balances;
pub mod config;
pub mod error;
pub mod execution;
