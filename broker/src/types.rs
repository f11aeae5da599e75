//! Shared broker types: quotes, searches, orders, positions.

use std::fmt;

use chrono::NaiveDate;
use trendbook::{AssetId, InstrumentSearch};

/// Account id used when placing orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque order id returned by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latest close and the close one lookback period earlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexQuote {
    pub last_price: f64,
    pub compare_price: f64,
}

/// One daily bar; only the close is used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub close: f64,
}

/// Leveraged tracker search filter. Results are sorted ascending on
/// `sort_field`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentQuery {
    pub directions: Vec<String>,
    pub sub_types: Vec<String>,
    pub underlying_instruments: Vec<AssetId>,
    pub name_query: Option<String>,
    pub limit: u32,
    pub offset: u32,
    pub sort_field: String,
}

impl InstrumentQuery {
    /// Long mini futures on `underlying`, sorted by leverage ascending.
    ///
    /// A name-query search replaces the underlying filter entirely.
    pub fn long_mini_futures(underlying: &AssetId, search: &InstrumentSearch, limit: u32) -> Self {
        let (underlying_instruments, name_query) = match search {
            InstrumentSearch::Underlying => (vec![underlying.clone()], None),
            InstrumentSearch::NameQuery { query } => (Vec::new(), Some(query.clone())),
        };
        Self {
            directions: vec!["long".into()],
            sub_types: vec!["mini_future".into()],
            underlying_instruments,
            name_query,
            limit,
            offset: 0,
            sort_field: "leverage".into(),
        }
    }
}

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerSide {
    Buy,
    Sell,
}

impl fmt::Display for BrokerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerSide::Buy => write!(f, "BUY"),
            BrokerSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order to place, for either a tracker or a fund.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub account: AccountId,
    pub orderbook_id: AssetId,
    pub side: BrokerSide,
    pub volume: u64,
    pub price: f64,
}

/// Outcome reported by an order placement call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementStatus {
    Success,
    Rejected(String),
}

impl PlacementStatus {
    /// Map the broker's status string; only `SUCCESS` counts as placed.
    pub fn from_status(status: &str) -> Self {
        if status == "SUCCESS" {
            PlacementStatus::Success
        } else {
            PlacementStatus::Rejected(status.to_string())
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PlacementStatus::Success)
    }
}

/// Tracker order placement response. Trackers execute immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlacement {
    pub status: PlacementStatus,
    pub order_id: Option<OrderId>,
}

/// Fund order placement response. Funds settle on a later on-account date.
#[derive(Debug, Clone, PartialEq)]
pub struct FundPlacement {
    pub status: PlacementStatus,
    pub order_id: Option<OrderId>,
    pub settlement_date: Option<NaiveDate>,
}

/// Order lifecycle state as far as confirmation cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderState {
    FullyExecuted,
    Other(String),
}

impl OrderState {
    pub fn from_status(status: &str) -> Self {
        if status == "FULLY_EXECUTED" {
            OrderState::FullyExecuted
        } else {
            OrderState::Other(status.to_string())
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderState::FullyExecuted => write!(f, "FULLY_EXECUTED"),
            OrderState::Other(s) => f.write_str(s),
        }
    }
}

/// A raw held instrument as the broker reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldPosition {
    pub orderbook_id: AssetId,
    pub total_value: f64,
    pub shares: f64,
}

/// A cash balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashPosition {
    pub total_value: f64,
}

/// Everything held on one account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPositions {
    pub asset_positions: Vec<HeldPosition>,
    pub cash_positions: Vec<CashPosition>,
}

impl AccountPositions {
    pub fn total_cash(&self) -> f64 {
        self.cash_positions.iter().map(|c| c.total_value).sum()
    }
}
