//! # trendbook
//!
//! Deterministic planning core for a momentum / trend-following rotation
//! traded through leveraged trackers.
//!
//! Once per period the engine:
//!
//! 1. **Ranks** the universe by momentum and keeps the top `agg` assets,
//!    swapping in a backup fund for any asset trading below its moving
//!    average ([`ranking`]).
//! 2. **Normalizes** held positions to exactly `agg` slots by splitting the
//!    backup fund position ([`normalize`]).
//! 3. **Diffs** held underlyings against the targets and pairs every slot
//!    that must go with one target that must come in ([`reconcile`]).
//! 4. **Selects** the tracker whose leverage is closest to the configured
//!    target for each underlying bought ([`selector`]).
//!
//! Nothing here talks to a broker. Fetching data and placing orders lives in
//! `trendbook-broker` and `trendbook-rebalancer`.
//!
//! ## Quick Start
//!
//! ```
//! use trendbook::{Asset, AssetId, AssetSignal, select_targets};
//!
//! let backup = AssetId::new("CASH");
//! let signals = vec![
//!     AssetSignal { asset: Asset::new("OMX", "A", 2), percentage_change: 1.08, relative_sma: 1.02 },
//!     AssetSignal { asset: Asset::new("DAX", "B", 2), percentage_change: 1.12, relative_sma: 0.97 },
//!     AssetSignal { asset: Asset::new("SPX", "C", 2), percentage_change: 0.99, relative_sma: 1.05 },
//! ];
//!
//! // B has the strongest momentum but trades below its average
//! let targets = select_targets(&signals, 2, &backup).unwrap();
//! assert_eq!(targets, vec![AssetId::new("CASH"), AssetId::new("A")]);
//! ```
//!
//! ## Planning Swaps
//!
//! ```
//! use trendbook::{Asset, AssetId, Error, Position, normalize_positions, plan_trades};
//!
//! let backup = AssetId::new("CASH");
//! let universe = vec![Asset::new("OMX", "A", 2), Asset::new("DAX", "B", 3)];
//!
//! // One tracker on A plus the backup fund, two slots wanted
//! let held = vec![
//!     Position::tracking(&AssetId::new("MINI-A"), &AssetId::new("A"), 1_000.0, 10.0),
//!     Position::direct(&backup, 2_000.0, 20.0),
//! ];
//! let slots = normalize_positions(held, 2, &backup).unwrap();
//!
//! let targets = vec![AssetId::new("B"), backup.clone()];
//! let trades = plan_trades(&slots, &targets, &universe, &backup, |asset: &Asset| {
//!     Ok::<_, Error>(AssetId::new(format!("MINI-{}", asset.asset_id)))
//! })
//! .unwrap();
//!
//! assert_eq!(trades.len(), 1);
//! assert_eq!(trades[0].sell_asset, AssetId::new("MINI-A"));
//! assert_eq!(trades[0].buy_asset, AssetId::new("MINI-B"));
//! ```
//!
//! ## Tracker Selection
//!
//! | Rule | Behavior |
//! |------|----------|
//! | **Order** | by distance between leverage and target, search order on ties |
//! | **Accept** | first with traded value > 0 and leverage < target + 1 |
//! | **Fallback** | closest candidate overall |
//! | **Empty** | [`Error::NoSuitableInstrument`] |

mod error;
pub mod indicators;
pub mod normalize;
pub mod ranking;
pub mod reconcile;
pub mod selector;
mod types;

// Re-export public API
pub use error::{Error, Result};
pub use normalize::normalize_positions;
pub use ranking::{rank, select_targets};
pub use reconcile::{allocate_cash, diff_holdings, plan_trades, HoldingsDiff};
pub use selector::select_instrument;
pub use types::{
    Asset, AssetId, AssetSignal, InstrumentSearch, LeveragedInstrument, LookbackPeriod,
    Position, TradeInstruction, TradeKind,
};
