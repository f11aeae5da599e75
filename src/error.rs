//! Errors raised while ranking, normalizing and planning.

use crate::types::AssetId;

/// Errors returned by the planning pipeline.
///
/// Every variant is fatal for the rebalancing pass that raised it: acting on
/// an incomplete target set is worse than keeping stale holdings.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// A market-data lookup failed or returned unusable numbers.
    #[error("market data unavailable for {asset}: {reason}")]
    DataUnavailable { asset: AssetId, reason: String },

    /// Settings and universe disagree.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Positions cannot be padded to the target count.
    #[error("cannot normalize positions: {0}")]
    Normalization(String),

    /// Instrument search came back empty.
    #[error("no suitable instrument tracks {underlying}")]
    NoSuitableInstrument { underlying: AssetId },
}

impl Error {
    pub fn data_unavailable(asset: &AssetId, reason: impl Into<String>) -> Self {
        Error::DataUnavailable {
            asset: asset.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
