//! Momentum ranking with a trend filter.
//!
//! Assets are ordered by momentum (descending, stable on universe order).
//! The top `agg` entries become target holdings, except that an entry
//! trading below its moving average is replaced by the backup asset. The
//! backup asset may therefore appear several times in the output.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::types::{AssetId, AssetSignal};

/// Order signals by momentum, strongest first.
///
/// Ties keep their universe order.
pub fn rank(signals: &[AssetSignal]) -> Vec<&AssetSignal> {
    let mut ranked: Vec<&AssetSignal> = signals.iter().collect();
    ranked.sort_by(|a, b| descending(a.percentage_change, b.percentage_change));
    ranked
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Pick the `agg` underlyings to hold next period.
///
/// Fails with a configuration error when fewer than `agg` assets were
/// ranked, and with a data error when a signal is not a finite number.
pub fn select_targets(signals: &[AssetSignal], agg: usize, backup: &AssetId) -> Result<Vec<AssetId>> {
    if agg == 0 {
        return Err(Error::Configuration("target holding count must be > 0".into()));
    }
    if signals.len() < agg {
        return Err(Error::Configuration(format!(
            "universe has {} assets, fewer than the target count {agg}",
            signals.len()
        )));
    }
    if let Some(bad) = signals
        .iter()
        .find(|s| !s.percentage_change.is_finite() || !s.relative_sma.is_finite())
    {
        return Err(Error::data_unavailable(
            &bad.asset.asset_id,
            format!(
                "non-finite signal (change={}, relative_sma={})",
                bad.percentage_change, bad.relative_sma
            ),
        ));
    }

    let targets = rank(signals)
        .into_iter()
        .take(agg)
        .map(|s| {
            if s.in_uptrend() {
                s.asset.asset_id.clone()
            } else {
                backup.clone()
            }
        })
        .collect();

    Ok(targets)
}
