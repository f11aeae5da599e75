//! Core types: AssetId, Asset, AssetSignal, Position, TradeInstruction

use std::fmt;

/// Brokerage orderbook identifier.
///
/// Underlyings, leveraged trackers and the backup fund all live in the same
/// id space, so a single type covers every identifier the engine handles.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Window over which momentum is measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum LookbackPeriod {
    OneWeek,
    OneMonth,
    ThreeMonths,
    OneYear,
}

impl fmt::Display for LookbackPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookbackPeriod::OneWeek => write!(f, "ONE_WEEK"),
            LookbackPeriod::OneMonth => write!(f, "ONE_MONTH"),
            LookbackPeriod::ThreeMonths => write!(f, "THREE_MONTHS"),
            LookbackPeriod::OneYear => write!(f, "ONE_YEAR"),
        }
    }
}

/// How leveraged trackers for an underlying are looked up.
///
/// Most underlyings are searched by their own orderbook id. Some (broad
/// indices) are only reachable through a free-text name query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum InstrumentSearch {
    #[default]
    Underlying,
    NameQuery { query: String },
}

/// An entry of the tradable universe.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Asset {
    /// Display name
    #[cfg_attr(feature = "serde", serde(rename = "asset"))]
    pub name: String,
    pub asset_id: AssetId,
    /// Target leverage of the tracker bought for this underlying (2 = 2x)
    pub target_lev: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub search: InstrumentSearch,
}

impl Asset {
    pub fn new(name: &str, asset_id: &str, target_lev: u32) -> Self {
        Self {
            name: name.to_string(),
            asset_id: AssetId::new(asset_id),
            target_lev,
            search: InstrumentSearch::Underlying,
        }
    }

    pub fn with_search(mut self, search: InstrumentSearch) -> Self {
        self.search = search;
        self
    }
}

/// Momentum and trend readings for one universe asset, computed once per run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AssetSignal {
    pub asset: Asset,
    /// Last price divided by the price one lookback period ago
    pub percentage_change: f64,
    /// Last close divided by its simple moving average
    pub relative_sma: f64,
}

impl AssetSignal {
    /// Price sits above its own moving average.
    pub fn in_uptrend(&self) -> bool {
        self.relative_sma > 1.0
    }
}

/// A held position, keyed by the underlying it gives exposure to.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// Tradable instrument actually held
    pub orderbook_id: AssetId,
    /// Underlying tracked; equals `orderbook_id` for the backup asset
    pub underlying_id: AssetId,
    /// Market value in account currency
    pub value: f64,
    /// Units held
    pub volume: f64,
}

impl Position {
    /// A position in an instrument that is its own underlying (the backup fund).
    pub fn direct(id: &AssetId, value: f64, volume: f64) -> Self {
        Self {
            orderbook_id: id.clone(),
            underlying_id: id.clone(),
            value,
            volume,
        }
    }

    /// A position in a tracker of `underlying_id`.
    pub fn tracking(orderbook_id: &AssetId, underlying_id: &AssetId, value: f64, volume: f64) -> Self {
        Self {
            orderbook_id: orderbook_id.clone(),
            underlying_id: underlying_id.clone(),
            value,
            volume,
        }
    }
}

/// One sell-then-buy swap.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradeInstruction {
    pub sell_asset: AssetId,
    pub buy_asset: AssetId,
    /// Value of the sold position
    pub sell_value: f64,
    /// Units of the sold position
    pub volume: f64,
    /// Free cash added on top of the sale proceeds
    pub extra_buy_cash: f64,
}

impl TradeInstruction {
    /// Amount spent on the buy leg.
    pub fn buy_value(&self) -> f64 {
        self.sell_value + self.extra_buy_cash
    }

    /// Which settlement path this swap takes, given the backup asset.
    pub fn kind(&self, backup: &AssetId) -> TradeKind {
        if &self.sell_asset == backup {
            TradeKind::CashToInstrument
        } else if &self.buy_asset == backup {
            TradeKind::InstrumentToCash
        } else {
            TradeKind::InstrumentToInstrument
        }
    }
}

impl fmt::Display for TradeInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({:.2} + {:.2} cash)",
            self.sell_asset, self.buy_asset, self.sell_value, self.extra_buy_cash
        )
    }
}

/// Leg ordering variant of a swap.
///
/// Fund orders settle on a later on-account date while trackers execute
/// immediately, so each variant waits at a different point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TradeKind {
    CashToInstrument,
    InstrumentToCash,
    InstrumentToInstrument,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::CashToInstrument => write!(f, "cash->instrument"),
            TradeKind::InstrumentToCash => write!(f, "instrument->cash"),
            TradeKind::InstrumentToInstrument => write!(f, "instrument->instrument"),
        }
    }
}

/// A leveraged long tracker returned by instrument search.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeveragedInstrument {
    pub orderbook_id: AssetId,
    pub name: String,
    pub leverage: f64,
    /// Value traded over the recent session; zero means no recent volume
    pub traded_value: f64,
}
