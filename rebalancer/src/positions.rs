//! Account holdings translated into planning positions.

use log::debug;
use rustc_hash::FxHashMap;
use trendbook::{AssetId, Position};
use trendbook_broker::{AccountPositions, Brokerage};

use crate::error::Result;

/// Positions plus free cash of the traded account.
#[derive(Debug, Clone, PartialEq)]
pub struct Holdings {
    pub positions: Vec<Position>,
    pub cash: f64,
}

/// Translate raw holdings. The caller holds the session.
///
/// The backup asset is its own underlying; every other instrument's underlying
/// is looked up. A failed lookup is `DataUnavailable`.
pub fn translate_positions<B: Brokerage + ?Sized>(
    broker: &B,
    raw: &AccountPositions,
    backup: &AssetId,
) -> Result<Vec<Position>> {
    let mut underlyings: FxHashMap<&AssetId, AssetId> = FxHashMap::default();
    let mut positions = Vec::with_capacity(raw.asset_positions.len());

    for held in &raw.asset_positions {
        let id = &held.orderbook_id;
        if id == backup {
            positions.push(Position::direct(id, held.total_value, held.shares));
            continue;
        }

        let underlying = match underlyings.get(id) {
            Some(u) => u.clone(),
            None => {
                let u = broker
                    .underlying_for(id)
                    .map_err(|e| trendbook::Error::data_unavailable(id, format!("underlying: {e}")))?;
                if u.is_empty() {
                    return Err(trendbook::Error::data_unavailable(id, "empty underlying id").into());
                }
                underlyings.insert(id, u.clone());
                u
            }
        };
        debug!("{id} tracks {underlying}");
        positions.push(Position::tracking(id, &underlying, held.total_value, held.shares));
    }

    Ok(positions)
}

/// Fetch and translate the holdings of `account_url`. The caller holds the session.
pub fn fetch_holdings<B: Brokerage + ?Sized>(
    broker: &B,
    account_url: &str,
    backup: &AssetId,
) -> Result<Holdings> {
    let raw = broker.account_positions(account_url)?;
    Ok(Holdings {
        positions: translate_positions(broker, &raw, backup)?,
        cash: raw.total_cash(),
    })
}
