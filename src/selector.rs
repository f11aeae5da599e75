//! Closest-leverage tracker selection.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::types::{AssetId, LeveragedInstrument};

/// Pick the tracker to buy for `underlying` at `target_lev`.
///
/// Candidates are ordered by `|leverage - target_lev|` (stable on search
/// order). The first one with recent traded value and leverage below
/// `target_lev + 1` wins. If none qualifies, the closest candidate is taken
/// regardless of volume or ceiling.
pub fn select_instrument<'a>(
    underlying: &AssetId,
    candidates: &'a [LeveragedInstrument],
    target_lev: u32,
) -> Result<&'a LeveragedInstrument> {
    let target = f64::from(target_lev);
    let ceiling = target + 1.0;

    let mut by_distance: Vec<&LeveragedInstrument> = candidates.iter().collect();
    by_distance.sort_by(|a, b| {
        let da = (a.leverage - target).abs();
        let db = (b.leverage - target).abs();
        da.partial_cmp(&db).unwrap_or(Ordering::Equal)
    });

    by_distance
        .iter()
        .find(|c| c.traded_value > 0.0 && c.leverage < ceiling)
        .or_else(|| by_distance.first())
        .copied()
        .ok_or_else(|| Error::NoSuitableInstrument {
            underlying: underlying.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, leverage: f64, traded: f64) -> LeveragedInstrument {
        LeveragedInstrument {
            orderbook_id: AssetId::new(id),
            name: format!("MINI L {id}"),
            leverage,
            traded_value: traded,
        }
    }

    fn underlying() -> AssetId {
        AssetId::new("19002")
    }

    #[test]
    fn closest_by_distance() {
        let c = vec![
            candidate("L10", 1.0, 100.0),
            candidate("L18", 1.8, 100.0),
            candidate("L30", 3.0, 100.0),
        ];
        let pick = select_instrument(&underlying(), &c, 2).unwrap();
        assert_eq!(pick.orderbook_id.as_str(), "L18");
    }

    #[test]
    fn ceiling_excludes_overshoot() {
        let c = vec![candidate("L10", 1.0, 100.0), candidate("L45", 4.5, 100.0)];
        let pick = select_instrument(&underlying(), &c, 2).unwrap();
        assert_eq!(pick.orderbook_id.as_str(), "L10");
    }

    #[test]
    fn ceiling_is_exclusive() {
        // Same distance; 3.0 comes first but sits on the ceiling
        let c = vec![candidate("L30", 3.0, 100.0), candidate("L10", 1.0, 100.0)];
        let pick = select_instrument(&underlying(), &c, 2).unwrap();
        assert_eq!(pick.orderbook_id.as_str(), "L10");
    }

    #[test]
    fn skips_candidates_without_volume() {
        let c = vec![candidate("L20", 2.0, 0.0), candidate("L22", 2.2, 5_000.0)];
        let pick = select_instrument(&underlying(), &c, 2).unwrap();
        assert_eq!(pick.orderbook_id.as_str(), "L22");
    }

    #[test]
    fn falls_back_to_closest_overall() {
        let c = vec![
            candidate("L50", 5.0, 100.0),
            candidate("L21", 2.1, 0.0),
            candidate("L19", 1.9, 0.0),
        ];
        let pick = select_instrument(&underlying(), &c, 2).unwrap();
        // 2.1 and 1.9 tie on distance; search order decides
        assert_eq!(pick.orderbook_id.as_str(), "L21");
    }

    #[test]
    fn equal_distance_keeps_search_order() {
        let c = vec![candidate("L25", 2.5, 10.0), candidate("L15", 1.5, 10.0)];
        let pick = select_instrument(&underlying(), &c, 2).unwrap();
        assert_eq!(pick.orderbook_id.as_str(), "L25");
    }

    #[test]
    fn empty_candidates_is_error() {
        let err = select_instrument(&underlying(), &[], 2).unwrap_err();
        assert_eq!(
            err,
            Error::NoSuitableInstrument {
                underlying: underlying()
            }
        );
    }
}
