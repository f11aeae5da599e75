//! Mock brokerage for testing. Implements the `Brokerage` trait with scripted behavior.
//!
//! Use this in integration tests to simulate broker responses without network calls.
//!
//! ```ignore
//! use trendbook_broker::mock::MockBrokerage;
//! use trendbook_broker::PlacementStatus;
//!
//! let broker = MockBrokerage::builder()
//!     .with_index_quote("A", 110.0, 100.0)
//!     .with_history("A", &[95.0, 100.0, 105.0])
//!     .with_position("CASH", 10_000.0, 100.0)
//!     .with_placement_script(vec![PlacementStatus::Rejected("ERROR".into())])
//!     .build();
//! ```
//!
//! Every data and order call fails with [`BrokerError::NotConnected`] unless a
//! session is held, so tests also check acquire/release discipline.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use trendbook::{AssetId, LeveragedInstrument, LookbackPeriod};

use crate::Brokerage;
use crate::error::BrokerError;
use crate::types::*;

/// Which placement endpoint an order went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKind {
    Instrument,
    Fund,
}

/// A recorded placement attempt for assertion in tests.
#[derive(Clone, Debug)]
pub struct RecordedOrder {
    pub kind: OrderKind,
    pub orderbook_id: AssetId,
    pub side: BrokerSide,
    pub volume: u64,
    pub price: f64,
    pub status: PlacementStatus,
    pub order_id: Option<OrderId>,
}

/// Session bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub authenticated: usize,
    pub ended: usize,
    pub active: usize,
}

/// Builder for `MockBrokerage`.
pub struct MockBrokerageBuilder {
    index_quotes: Vec<(AssetId, IndexQuote)>,
    histories: Vec<(AssetId, Vec<f64>)>,
    instruments: Vec<(String, Vec<LeveragedInstrument>)>,
    prices: Vec<(AssetId, f64)>,
    positions: AccountPositions,
    underlyings: Vec<(AssetId, AssetId)>,
    accounts: Vec<(String, AccountId)>,
    placement_script: Vec<PlacementStatus>,
    order_states: Vec<(AssetId, OrderState)>,
    settlement_date: Option<NaiveDate>,
    unavailable: Vec<AssetId>,
    reject_auth: bool,
}

impl MockBrokerageBuilder {
    pub fn with_index_quote(mut self, asset: &str, last: f64, compare: f64) -> Self {
        self.index_quotes.push((
            AssetId::new(asset),
            IndexQuote {
                last_price: last,
                compare_price: compare,
            },
        ));
        self
    }

    pub fn with_history(mut self, asset: &str, closes: &[f64]) -> Self {
        self.histories.push((AssetId::new(asset), closes.to_vec()));
        self
    }

    /// Search results keyed by underlying id or by name query.
    pub fn with_instruments(mut self, key: &str, instruments: Vec<LeveragedInstrument>) -> Self {
        self.instruments.push((key.to_string(), instruments));
        self
    }

    pub fn with_price(mut self, asset: &str, price: f64) -> Self {
        self.prices.push((AssetId::new(asset), price));
        self
    }

    pub fn with_position(mut self, orderbook_id: &str, total_value: f64, shares: f64) -> Self {
        self.positions.asset_positions.push(HeldPosition {
            orderbook_id: AssetId::new(orderbook_id),
            total_value,
            shares,
        });
        self
    }

    pub fn with_cash(mut self, total_value: f64) -> Self {
        self.positions.cash_positions.push(CashPosition { total_value });
        self
    }

    pub fn with_underlying(mut self, instrument: &str, underlying: &str) -> Self {
        self.underlyings
            .push((AssetId::new(instrument), AssetId::new(underlying)));
        self
    }

    pub fn with_account(mut self, url: &str, id: &str) -> Self {
        self.accounts.push((url.to_string(), AccountId(id.to_string())));
        self
    }

    /// Statuses returned by successive placements (tracker and fund alike).
    /// Once exhausted, placements succeed.
    pub fn with_placement_script(mut self, script: Vec<PlacementStatus>) -> Self {
        self.placement_script = script;
        self
    }

    /// State reported for every order placed on `orderbook_id`.
    /// Orders default to fully executed.
    pub fn with_order_state(mut self, orderbook_id: &str, state: OrderState) -> Self {
        self.order_states.push((AssetId::new(orderbook_id), state));
        self
    }

    /// On-account date reported by fund placements.
    pub fn with_settlement_date(mut self, date: Option<NaiveDate>) -> Self {
        self.settlement_date = date;
        self
    }

    /// Make every lookup concerning `asset` fail.
    pub fn unavailable(mut self, asset: &str) -> Self {
        self.unavailable.push(AssetId::new(asset));
        self
    }

    pub fn reject_auth(mut self) -> Self {
        self.reject_auth = true;
        self
    }

    pub fn build(self) -> MockBrokerage {
        MockBrokerage {
            index_quotes: self.index_quotes,
            histories: self.histories,
            instruments: self.instruments,
            prices: self.prices,
            positions: self.positions,
            underlyings: self.underlyings,
            accounts: self.accounts,
            placement_script: Mutex::new(self.placement_script.into()),
            order_states: self.order_states,
            settlement_date: self.settlement_date,
            unavailable: self.unavailable,
            reject_auth: self.reject_auth,
            next_order_id: AtomicU64::new(1),
            orders: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            session: Mutex::new(SessionStats::default()),
        }
    }
}

/// A mock brokerage that records placements and returns scripted responses.
pub struct MockBrokerage {
    index_quotes: Vec<(AssetId, IndexQuote)>,
    histories: Vec<(AssetId, Vec<f64>)>,
    instruments: Vec<(String, Vec<LeveragedInstrument>)>,
    prices: Vec<(AssetId, f64)>,
    positions: AccountPositions,
    underlyings: Vec<(AssetId, AssetId)>,
    accounts: Vec<(String, AccountId)>,
    placement_script: Mutex<VecDeque<PlacementStatus>>,
    order_states: Vec<(AssetId, OrderState)>,
    settlement_date: Option<NaiveDate>,
    unavailable: Vec<AssetId>,
    reject_auth: bool,
    next_order_id: AtomicU64,
    orders: Mutex<Vec<RecordedOrder>>,
    queries: Mutex<Vec<InstrumentQuery>>,
    session: Mutex<SessionStats>,
}

impl MockBrokerage {
    pub fn builder() -> MockBrokerageBuilder {
        MockBrokerageBuilder {
            index_quotes: Vec::new(),
            histories: Vec::new(),
            instruments: Vec::new(),
            prices: Vec::new(),
            positions: AccountPositions::default(),
            underlyings: Vec::new(),
            accounts: Vec::new(),
            placement_script: Vec::new(),
            order_states: Vec::new(),
            settlement_date: NaiveDate::from_ymd_opt(2000, 1, 3),
            unavailable: Vec::new(),
            reject_auth: false,
        }
    }

    /// All placement attempts, in call order.
    pub fn orders(&self) -> Vec<RecordedOrder> {
        self.orders.lock().unwrap().clone()
    }

    /// All instrument searches, in call order.
    pub fn queries(&self) -> Vec<InstrumentQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn session_stats(&self) -> SessionStats {
        *self.session.lock().unwrap()
    }

    fn require_session(&self) -> Result<(), BrokerError> {
        if self.session.lock().unwrap().active == 0 {
            return Err(BrokerError::NotConnected);
        }
        Ok(())
    }

    fn require_available(&self, asset: &AssetId) -> Result<(), BrokerError> {
        self.require_session()?;
        if self.unavailable.contains(asset) {
            return Err(BrokerError::Connection(format!("mock: {asset} unavailable")));
        }
        Ok(())
    }

    fn place(&self, kind: OrderKind, order: &OrderRequest) -> Result<(PlacementStatus, Option<OrderId>), BrokerError> {
        self.require_available(&order.orderbook_id)?;

        let status = self
            .placement_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PlacementStatus::Success);
        let order_id = status.is_success().then(|| {
            OrderId(format!("M{}", self.next_order_id.fetch_add(1, Ordering::SeqCst)))
        });

        self.orders.lock().unwrap().push(RecordedOrder {
            kind,
            orderbook_id: order.orderbook_id.clone(),
            side: order.side,
            volume: order.volume,
            price: order.price,
            status: status.clone(),
            order_id: order_id.clone(),
        });

        Ok((status, order_id))
    }
}

impl Brokerage for MockBrokerage {
    fn authenticate(&self) -> Result<(), BrokerError> {
        if self.reject_auth {
            return Err(BrokerError::Auth("mock: credentials rejected".into()));
        }
        let mut session = self.session.lock().unwrap();
        session.authenticated += 1;
        session.active += 1;
        Ok(())
    }

    fn end_session(&self) -> Result<(), BrokerError> {
        let mut session = self.session.lock().unwrap();
        if session.active > 0 {
            session.active -= 1;
            session.ended += 1;
        }
        Ok(())
    }

    fn index_quote(&self, asset: &AssetId, _period: LookbackPeriod) -> Result<IndexQuote, BrokerError> {
        self.require_available(asset)?;
        self.index_quotes
            .iter()
            .find(|(id, _)| id == asset)
            .map(|(_, q)| *q)
            .ok_or_else(|| BrokerError::NotFound(format!("index quote for {asset}")))
    }

    fn price_history(&self, asset: &AssetId) -> Result<Vec<Candle>, BrokerError> {
        self.require_available(asset)?;
        self.histories
            .iter()
            .find(|(id, _)| id == asset)
            .map(|(_, closes)| closes.iter().map(|&close| Candle { close }).collect())
            .ok_or_else(|| BrokerError::NotFound(format!("price history for {asset}")))
    }

    fn leveraged_instruments(
        &self,
        query: &InstrumentQuery,
    ) -> Result<Vec<LeveragedInstrument>, BrokerError> {
        self.require_session()?;
        self.queries.lock().unwrap().push(query.clone());

        let key = match (&query.name_query, query.underlying_instruments.first()) {
            (Some(name), _) => name.clone(),
            (None, Some(underlying)) => underlying.to_string(),
            (None, None) => return Ok(Vec::new()),
        };
        Ok(self
            .instruments
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, list)| list.clone())
            .unwrap_or_default())
    }

    fn last_price(&self, asset: &AssetId) -> Result<f64, BrokerError> {
        self.require_available(asset)?;
        self.prices
            .iter()
            .find(|(id, _)| id == asset)
            .map(|(_, p)| *p)
            .ok_or_else(|| BrokerError::NotFound(format!("price for {asset}")))
    }

    fn place_instrument_order(&self, order: &OrderRequest) -> Result<OrderPlacement, BrokerError> {
        let (status, order_id) = self.place(OrderKind::Instrument, order)?;
        Ok(OrderPlacement { status, order_id })
    }

    fn place_fund_order(&self, order: &OrderRequest) -> Result<FundPlacement, BrokerError> {
        let (status, order_id) = self.place(OrderKind::Fund, order)?;
        Ok(FundPlacement {
            status,
            order_id,
            settlement_date: self.settlement_date,
        })
    }

    fn order_status(&self, _account: &AccountId, order: &OrderId) -> Result<OrderState, BrokerError> {
        self.require_session()?;
        let orders = self.orders.lock().unwrap();
        let placed = orders
            .iter()
            .find(|o| o.order_id.as_ref() == Some(order))
            .ok_or_else(|| BrokerError::NotFound(format!("order {order}")))?;

        Ok(self
            .order_states
            .iter()
            .find(|(id, _)| *id == placed.orderbook_id)
            .map(|(_, state)| state.clone())
            .unwrap_or(OrderState::FullyExecuted))
    }

    fn account_positions(&self, _account_url: &str) -> Result<AccountPositions, BrokerError> {
        self.require_session()?;
        Ok(self.positions.clone())
    }

    fn resolve_account(&self, account_url: &str) -> Result<AccountId, BrokerError> {
        self.require_session()?;
        self.accounts
            .iter()
            .find(|(url, _)| url == account_url)
            .map(|(_, id)| id.clone())
            .ok_or_else(|| BrokerError::NotFound(format!("account {account_url}")))
    }

    fn underlying_for(&self, instrument: &AssetId) -> Result<AssetId, BrokerError> {
        self.require_available(instrument)?;
        self.underlyings
            .iter()
            .find(|(id, _)| id == instrument)
            .map(|(_, u)| u.clone())
            .ok_or_else(|| BrokerError::NotFound(format!("underlying of {instrument}")))
    }
}
