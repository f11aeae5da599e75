//! Error types for the rebalancer.

use std::path::PathBuf;

use trendbook::AssetId;
use trendbook_broker::BrokerError;

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

    #[error("failed to read credentials file {path}: {source}")]
    CredentialsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Ranking, normalization or planning failed; the run is abandoned.
    #[error(transparent)]
    Plan(#[from] trendbook::Error),

    #[error("brokerage error: {0}")]
    Broker(#[from] BrokerError),

    #[error("could not place order for {asset} after {attempts} attempts: {reason}")]
    PlacementFailed {
        asset: AssetId,
        attempts: u32,
        reason: String,
    },

    /// An order did not reach the executed state, or its status could not be read.
    #[error("execution mismatch for {asset}: {detail}")]
    ExecutionMismatch { asset: AssetId, detail: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("trade task panicked")]
    TaskPanicked,

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
