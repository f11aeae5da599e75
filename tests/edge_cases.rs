//! Edge-case tests: whole planning passes through the public API.

use trendbook::{
    Asset, AssetId, AssetSignal, Error, LeveragedInstrument, Position, TradeKind, allocate_cash,
    normalize_positions, plan_trades, select_instrument, select_targets,
};

fn id(s: &str) -> AssetId {
    AssetId::new(s)
}

fn cash() -> AssetId {
    id("CASH")
}

fn signal(asset: &Asset, change: f64, rel_sma: f64) -> AssetSignal {
    AssetSignal {
        asset: asset.clone(),
        percentage_change: change,
        relative_sma: rel_sma,
    }
}

fn candidates_for(underlying: &AssetId) -> Vec<LeveragedInstrument> {
    [(1.0, 10.0), (1.8, 10.0), (3.0, 10.0)]
        .iter()
        .map(|&(lev, traded)| LeveragedInstrument {
            orderbook_id: id(&format!("MINI-{underlying}-{lev}")),
            name: format!("MINI L {underlying}"),
            leverage: lev,
            traded_value: traded,
        })
        .collect()
}

fn resolve(asset: &Asset) -> Result<AssetId, Error> {
    let candidates = candidates_for(&asset.asset_id);
    select_instrument(&asset.asset_id, &candidates, asset.target_lev).map(|c| c.orderbook_id.clone())
}

// ============================================================================
// Full planning pass
// ============================================================================

#[test]
fn cash_only_account_rotates_into_leader() {
    let universe = vec![Asset::new("A", "A", 2), Asset::new("B", "B", 2)];
    let signals = vec![signal(&universe[0], 1.10, 1.05), signal(&universe[1], 1.01, 1.05)];

    let targets = select_targets(&signals, 1, &cash()).unwrap();
    assert_eq!(targets, vec![id("A")]);

    let held = vec![Position::direct(&cash(), 10_000.0, 100.0)];
    let slots = normalize_positions(held.clone(), 1, &cash()).unwrap();
    assert_eq!(slots, held);

    let mut trades = plan_trades(&slots, &targets, &universe, &cash(), resolve).unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].sell_asset, cash());
    assert_eq!(trades[0].buy_asset, id("MINI-A-1.8"));
    assert_eq!(trades[0].kind(&cash()), TradeKind::CashToInstrument);

    allocate_cash(&mut trades, 200.0, 0.05);
    assert!((trades[0].buy_value() - 10_190.0).abs() < 1e-9);
}

#[test]
fn everything_in_downtrend_moves_to_backup() {
    let universe = vec![Asset::new("A", "A", 2), Asset::new("B", "B", 2)];
    let signals = vec![signal(&universe[0], 1.10, 0.95), signal(&universe[1], 1.01, 0.90)];
    let targets = select_targets(&signals, 2, &cash()).unwrap();
    assert_eq!(targets, vec![cash(), cash()]);

    let held = vec![
        Position::tracking(&id("MINI-A"), &id("A"), 5_000.0, 50.0),
        Position::tracking(&id("MINI-B"), &id("B"), 3_000.0, 30.0),
    ];
    let slots = normalize_positions(held, 2, &cash()).unwrap();
    let trades = plan_trades(&slots, &targets, &universe, &cash(), resolve).unwrap();

    assert_eq!(trades.len(), 2);
    assert!(trades.iter().all(|t| t.buy_asset == cash()));
    assert!(trades.iter().all(|t| t.kind(&cash()) == TradeKind::InstrumentToCash));
    assert_eq!(trades[0].sell_asset, id("MINI-A"));
    assert_eq!(trades[1].sell_asset, id("MINI-B"));
}

#[test]
fn partial_backup_slot_funds_new_position() {
    let universe = vec![
        Asset::new("A", "A", 2),
        Asset::new("B", "B", 2),
        Asset::new("C", "C", 2),
    ];
    let signals = vec![
        signal(&universe[0], 1.20, 1.10),
        signal(&universe[1], 1.15, 1.10),
        signal(&universe[2], 0.90, 1.10),
    ];
    let targets = select_targets(&signals, 3, &cash()).unwrap();
    assert_eq!(targets, vec![id("A"), id("B"), id("C")]);

    // Holding A and a fund position worth 6000; two slots missing
    let held = vec![
        Position::tracking(&id("MINI-A"), &id("A"), 4_000.0, 40.0),
        Position::direct(&cash(), 6_000.0, 60.0),
    ];
    let slots = normalize_positions(held, 3, &cash()).unwrap();
    let trades = plan_trades(&slots, &targets, &universe, &cash(), resolve).unwrap();

    assert_eq!(trades.len(), 2);
    for t in &trades {
        assert_eq!(t.sell_asset, cash());
        assert!((t.sell_value - 3_000.0).abs() < 1e-9);
    }
    assert_eq!(trades[0].buy_asset, id("MINI-B-1.8"));
    assert_eq!(trades[1].buy_asset, id("MINI-C-1.8"));
}

#[test]
fn holding_targets_already_produces_no_trades() {
    let universe = vec![Asset::new("A", "A", 2)];
    let signals = vec![signal(&universe[0], 1.10, 1.05)];
    let targets = select_targets(&signals, 1, &cash()).unwrap();

    let held = vec![Position::tracking(&id("MINI-A-OLD"), &id("A"), 5_000.0, 50.0)];
    let trades = plan_trades(&held, &targets, &universe, &cash(), resolve).unwrap();
    assert!(trades.is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn missing_backup_aborts_before_planning() {
    let held = vec![Position::tracking(&id("MINI-A"), &id("A"), 5_000.0, 50.0)];
    let err = normalize_positions(held, 2, &cash()).unwrap_err();
    assert!(matches!(err, Error::Normalization(_)));
}

#[test]
fn empty_search_result_surfaces_as_error() {
    let universe = vec![Asset::new("A", "A", 2)];
    let held = vec![Position::direct(&cash(), 1_000.0, 10.0)];
    let err = plan_trades(&held, &[id("A")], &universe, &cash(), |a: &Asset| {
        select_instrument(&a.asset_id, &[], a.target_lev).map(|c| c.orderbook_id.clone())
    })
    .unwrap_err();
    assert_eq!(err, Error::NoSuitableInstrument { underlying: id("A") });
}
