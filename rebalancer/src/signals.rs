//! Momentum and trend readings fetched from the brokerage.

use log::debug;
use trendbook::indicators::{price_ratio, relative_sma};
use trendbook::{Asset, AssetSignal, LookbackPeriod};
use trendbook_broker::{Brokerage, SessionLease};

use crate::config::Settings;
use crate::error::Result;

/// Compute the signal of one asset. The caller holds the session.
///
/// Any failed lookup, or numbers that cannot form a ratio, is
/// `DataUnavailable` for that asset.
pub fn asset_signal<B: Brokerage + ?Sized>(
    broker: &B,
    asset: &Asset,
    period: LookbackPeriod,
    sma_window: usize,
) -> std::result::Result<AssetSignal, trendbook::Error> {
    let id = &asset.asset_id;
    let unavailable = |reason: String| trendbook::Error::data_unavailable(id, reason);

    let quote = broker
        .index_quote(id, period)
        .map_err(|e| unavailable(format!("index quote: {e}")))?;
    let percentage_change = price_ratio(quote.last_price, quote.compare_price).ok_or_else(|| {
        unavailable(format!(
            "cannot compare {} against {}",
            quote.last_price, quote.compare_price
        ))
    })?;

    let closes: Vec<f64> = broker
        .price_history(id)
        .map_err(|e| unavailable(format!("price history: {e}")))?
        .iter()
        .map(|c| c.close)
        .collect();
    let relative_sma = relative_sma(&closes, sma_window).ok_or_else(|| {
        unavailable(format!(
            "{} closes do not cover a {sma_window}-day average",
            closes.len()
        ))
    })?;

    debug!("{id}: change {percentage_change:.4}, relative SMA {relative_sma:.4}");
    Ok(AssetSignal {
        asset: asset.clone(),
        percentage_change,
        relative_sma,
    })
}

/// Signals for the whole universe, in universe order. Stops at the first
/// unavailable asset.
pub fn gather_signals<B: Brokerage + ?Sized>(
    broker: &B,
    universe: &[Asset],
    settings: &Settings,
) -> Result<Vec<AssetSignal>> {
    let session = SessionLease::acquire(broker)?;
    let signals = universe
        .iter()
        .map(|asset| {
            asset_signal(
                &*session,
                asset,
                settings.lookback_period,
                settings.sma_filter_length,
            )
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendbook_broker::mock::MockBrokerage;

    fn asset() -> Asset {
        Asset::new("A", "A", 2)
    }

    #[test]
    fn signal_from_quote_and_history() {
        let broker = MockBrokerage::builder()
            .with_index_quote("A", 110.0, 100.0)
            .with_history("A", &[50.0, 90.0, 100.0, 110.0])
            .build();
        let _session = SessionLease::acquire(&broker).unwrap();

        let s = asset_signal(&broker, &asset(), LookbackPeriod::OneMonth, 3).unwrap();
        assert!((s.percentage_change - 1.1).abs() < 1e-12);
        assert!((s.relative_sma - 1.1).abs() < 1e-12);
        assert!(s.in_uptrend());
    }

    #[test]
    fn short_history_is_unavailable() {
        let broker = MockBrokerage::builder()
            .with_index_quote("A", 110.0, 100.0)
            .with_history("A", &[100.0])
            .build();
        let _session = SessionLease::acquire(&broker).unwrap();

        let err = asset_signal(&broker, &asset(), LookbackPeriod::OneMonth, 200).unwrap_err();
        assert!(matches!(err, trendbook::Error::DataUnavailable { .. }));
    }

    #[test]
    fn zero_compare_price_is_unavailable() {
        let broker = MockBrokerage::builder()
            .with_index_quote("A", 110.0, 0.0)
            .with_history("A", &[100.0])
            .build();
        let _session = SessionLease::acquire(&broker).unwrap();

        assert!(asset_signal(&broker, &asset(), LookbackPeriod::OneWeek, 1).is_err());
    }

    #[test]
    fn missing_quote_is_unavailable() {
        let broker = MockBrokerage::builder().build();
        let _session = SessionLease::acquire(&broker).unwrap();
        let err = asset_signal(&broker, &asset(), LookbackPeriod::OneYear, 1).unwrap_err();
        assert!(err.to_string().contains("index quote"));
    }
}
