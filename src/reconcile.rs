//! CURRENT→TARGET holdings diff and swap planning.
//!
//! Works on underlyings, not instruments: a held tracker whose underlying is
//! still targeted stays untouched. Every other held slot is sold and its
//! proceeds pay for one target that is not held yet. Sells and buys are
//! paired by position in their lists, both kept in encounter order.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::types::{Asset, AssetId, Position, TradeInstruction};

/// Held slots to sell and target underlyings to buy.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingsDiff<'a> {
    /// Positions whose underlying is no longer targeted, in position order
    pub sells: Vec<&'a Position>,
    /// Targets not covered by a held slot, in target order
    pub buys: Vec<AssetId>,
}

/// Diff normalized positions against the target list.
///
/// Each target entry is consumed by at most one held slot, so a target that
/// appears twice (the backup asset) matches two distinct held slots. With as
/// many positions as targets the two sides always have equal length.
pub fn diff_holdings<'a>(positions: &'a [Position], targets: &[AssetId]) -> HoldingsDiff<'a> {
    let mut unmatched: Vec<Option<&AssetId>> = targets.iter().map(Some).collect();
    let mut sells = Vec::new();

    for pos in positions {
        let hit = unmatched
            .iter()
            .position(|t| t.is_some_and(|id| *id == pos.underlying_id));
        match hit {
            Some(i) => unmatched[i] = None,
            None => sells.push(pos),
        }
    }

    let buys = unmatched.into_iter().flatten().cloned().collect();

    HoldingsDiff { sells, buys }
}

/// Plan swaps from normalized positions to target underlyings.
///
/// `resolve` turns a target underlying into the concrete tracker to buy
/// (see [`crate::selector`]). It is not called for the backup asset, which is
/// bought directly. `extra_buy_cash` is left at zero; see [`allocate_cash`].
pub fn plan_trades<E, F>(
    positions: &[Position],
    targets: &[AssetId],
    universe: &[Asset],
    backup: &AssetId,
    mut resolve: F,
) -> std::result::Result<Vec<TradeInstruction>, E>
where
    E: From<Error>,
    F: FnMut(&Asset) -> std::result::Result<AssetId, E>,
{
    if positions.len() != targets.len() {
        return Err(Error::Normalization(format!(
            "{} positions cannot be paired with {} targets",
            positions.len(),
            targets.len()
        ))
        .into());
    }

    let by_id: FxHashMap<&AssetId, &Asset> = universe.iter().map(|a| (&a.asset_id, a)).collect();
    let diff = diff_holdings(positions, targets);

    let mut trades = Vec::with_capacity(diff.sells.len());
    for (sell, buy) in diff.sells.into_iter().zip(diff.buys) {
        let buy_asset = if &buy == backup {
            buy
        } else {
            let asset = by_id.get(&buy).ok_or_else(|| {
                Error::Configuration(format!("target {buy} is not part of the universe"))
            })?;
            resolve(asset)?
        };

        // Already holding exactly this instrument: nothing to trade.
        if buy_asset == sell.orderbook_id {
            continue;
        }

        trades.push(TradeInstruction {
            sell_asset: sell.orderbook_id.clone(),
            buy_asset,
            sell_value: sell.value,
            volume: sell.volume,
            extra_buy_cash: 0.0,
        });
    }

    Ok(trades)
}

/// Spread free cash evenly over the buy legs, withholding `buffer` (0.05 =
/// 5%) of each share.
pub fn allocate_cash(trades: &mut [TradeInstruction], total_cash: f64, buffer: f64) {
    if trades.is_empty() || total_cash <= 0.0 {
        return;
    }
    let share = total_cash / trades.len() as f64 * (1.0 - buffer);
    for trade in trades {
        trade.extra_buy_cash += share;
    }
}
