//! Tracker lookup for a target underlying.

use log::info;
use trendbook::{Asset, AssetId, select_instrument};
use trendbook_broker::{Brokerage, InstrumentQuery};

use crate::error::Result;

/// Search long mini futures on `asset` and pick the closest leverage.
/// The caller holds the session.
pub fn resolve_instrument<B: Brokerage + ?Sized>(
    broker: &B,
    asset: &Asset,
    limit: u32,
) -> Result<AssetId> {
    let query = InstrumentQuery::long_mini_futures(&asset.asset_id, &asset.search, limit);
    let candidates = broker.leveraged_instruments(&query)?;
    let chosen = select_instrument(&asset.asset_id, &candidates, asset.target_lev)?;
    info!(
        "{}: buying {} ({}, leverage {:.2})",
        asset.name, chosen.orderbook_id, chosen.name, chosen.leverage
    );
    Ok(chosen.orderbook_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendbook::{InstrumentSearch, LeveragedInstrument};
    use trendbook_broker::SessionLease;
    use trendbook_broker::mock::MockBrokerage;

    fn mini(id: &str, leverage: f64, traded_value: f64) -> LeveragedInstrument {
        LeveragedInstrument {
            orderbook_id: AssetId::new(id),
            name: format!("MINI L {id}"),
            leverage,
            traded_value,
        }
    }

    #[test]
    fn picks_closest_traded_leverage() {
        let broker = MockBrokerage::builder()
            .with_instruments("A", vec![mini("L1", 1.0, 10.0), mini("L18", 1.8, 10.0), mini("L3", 3.0, 10.0)])
            .build();
        let _session = SessionLease::acquire(&broker).unwrap();

        let chosen = resolve_instrument(&broker, &Asset::new("A", "A", 2), 20).unwrap();
        assert_eq!(chosen, AssetId::new("L18"));

        let query = &broker.queries()[0];
        assert_eq!(query.underlying_instruments, vec![AssetId::new("A")]);
        assert_eq!(query.limit, 20);
    }

    #[test]
    fn name_query_search() {
        let broker = MockBrokerage::builder()
            .with_instruments("SP500", vec![mini("S2", 2.1, 5.0)])
            .build();
        let _session = SessionLease::acquire(&broker).unwrap();

        let asset = Asset::new("S&P 500", "155458", 2).with_search(InstrumentSearch::NameQuery {
            query: "SP500".into(),
        });
        assert_eq!(resolve_instrument(&broker, &asset, 20).unwrap(), AssetId::new("S2"));
    }

    #[test]
    fn empty_search_is_no_suitable_instrument() {
        let broker = MockBrokerage::builder().build();
        let _session = SessionLease::acquire(&broker).unwrap();

        let err = resolve_instrument(&broker, &Asset::new("A", "A", 2), 20).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Plan(trendbook::Error::NoSuitableInstrument { .. })
        ));
    }
}
