//! Position-count normalization.
//!
//! Trades are planned as one-for-one swaps, which needs exactly as many held
//! slots as target holdings. When fewer positions are held, the backup fund
//! position is split into equal-value slots to make up the difference.

use crate::error::{Error, Result};
use crate::types::{AssetId, Position};

/// Pad `positions` to exactly `agg` slots by splitting the backup position.
///
/// With `missing = agg - positions.len()`, the backup position's value is
/// divided by `missing + 1` and `missing` copies of the shrunken slot are
/// appended. Unit volume is left as is on every backup slot; fund orders are
/// sized by value, not units.
///
/// Fails when the backup asset is not held, or when more positions are held
/// than there are targets (no swap pairing exists in either case).
pub fn normalize_positions(
    mut positions: Vec<Position>,
    agg: usize,
    backup: &AssetId,
) -> Result<Vec<Position>> {
    if positions.len() == agg {
        return Ok(positions);
    }
    if positions.len() > agg {
        return Err(Error::Normalization(format!(
            "holding {} positions, more than the target count {agg}",
            positions.len()
        )));
    }

    let backup_index = positions
        .iter()
        .rposition(|p| &p.orderbook_id == backup)
        .ok_or_else(|| {
            Error::Normalization(format!(
                "backup asset {backup} not present among current positions"
            ))
        })?;

    let missing = agg - positions.len();
    positions[backup_index].value /= (missing + 1) as f64;

    let slot = positions[backup_index].clone();
    positions.extend(std::iter::repeat_n(slot, missing));

    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cash() -> AssetId {
        AssetId::new("CASH")
    }

    fn warrant(id: &str, underlying: &str, value: f64) -> Position {
        Position::tracking(&AssetId::new(id), &AssetId::new(underlying), value, 10.0)
    }

    #[test]
    fn already_full_is_unchanged() {
        let positions = vec![warrant("W1", "A", 100.0), warrant("W2", "B", 200.0)];
        let out = normalize_positions(positions.clone(), 2, &cash()).unwrap();
        assert_eq!(out, positions);
    }

    #[test]
    fn full_without_backup_is_fine() {
        let positions = vec![warrant("W1", "A", 100.0)];
        assert!(normalize_positions(positions, 1, &cash()).is_ok());
    }

    #[test]
    fn splits_backup_into_equal_slots() {
        let positions = vec![
            warrant("W1", "A", 100.0),
            Position::direct(&cash(), 900.0, 42.0),
        ];
        let out = normalize_positions(positions, 4, &cash()).unwrap();

        assert_eq!(out.len(), 4);
        assert_eq!(out[0], warrant("W1", "A", 100.0));
        for slot in &out[1..] {
            assert_eq!(slot.orderbook_id, cash());
            assert_eq!(slot.underlying_id, cash());
            assert!((slot.value - 300.0).abs() < 1e-9);
            assert_eq!(slot.volume, 42.0);
        }
    }

    #[test]
    fn missing_backup_is_error() {
        let positions = vec![warrant("W1", "A", 100.0)];
        let err = normalize_positions(positions, 3, &cash()).unwrap_err();
        assert!(matches!(err, Error::Normalization(_)));
        assert!(err.to_string().contains("CASH"));
    }

    #[test]
    fn empty_account_is_error() {
        assert!(normalize_positions(Vec::new(), 2, &cash()).is_err());
    }

    #[test]
    fn too_many_positions_is_error() {
        let positions = vec![
            warrant("W1", "A", 100.0),
            warrant("W2", "B", 100.0),
            Position::direct(&cash(), 10.0, 1.0),
        ];
        assert!(matches!(
            normalize_positions(positions, 2, &cash()),
            Err(Error::Normalization(_))
        ));
    }
}
