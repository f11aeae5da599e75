//! trendbook-rebalancer: periodic trend-following rotation on a brokerage.
//!
//! Ranks the configured universe, reads the account's holdings, plans one swap
//! per slot that must change, confirms, and executes the swaps concurrently
//! with retries, settlement waits and a JSONL audit trail.

pub mod audit;
pub mod cancel;
pub mod config;
pub mod error;
pub mod execution;
pub mod instruments;
pub mod orders;
pub mod positions;
pub mod signals;
pub mod trade;
