//! Brokerage trait and implementations for trendbook.
//!
//! Provides a `Brokerage` trait covering everything the rebalancer needs
//! from the outside world: market data, tracker search, order placement,
//! order status and account holdings. Implementations:
//!
//! - **Mock** ([`mock::MockBrokerage`]): scripted responses for tests
//! - **Avanza** (feature `avanza`): blocking REST client
//!
//! All methods take `&self`. Trades execute concurrently against one shared
//! brokerage, so implementations keep their session state behind their own
//! lock and count outstanding [`SessionLease`]s.

pub mod error;
pub mod mock;
pub mod types;

#[cfg(feature = "avanza")]
pub mod avanza;

pub use error::BrokerError;
pub use types::*;

use std::ops::Deref;

use log::warn;
use trendbook::{AssetId, LeveragedInstrument, LookbackPeriod};

/// A brokerage session that can fetch data, place orders and list holdings.
pub trait Brokerage: Send + Sync {
    /// Open (or join) an authenticated session. Safe to call repeatedly.
    fn authenticate(&self) -> Result<(), BrokerError>;

    /// Release one session hold. Safe to call repeatedly.
    fn end_session(&self) -> Result<(), BrokerError>;

    /// Last price and the compare price for `period`.
    fn index_quote(&self, asset: &AssetId, period: LookbackPeriod) -> Result<IndexQuote, BrokerError>;

    /// Daily closes, oldest first.
    fn price_history(&self, asset: &AssetId) -> Result<Vec<Candle>, BrokerError>;

    /// Leveraged trackers matching `query`, in the broker's order.
    fn leveraged_instruments(
        &self,
        query: &InstrumentQuery,
    ) -> Result<Vec<LeveragedInstrument>, BrokerError>;

    /// Latest tradable price of an orderbook.
    fn last_price(&self, asset: &AssetId) -> Result<f64, BrokerError>;

    /// Place a tracker order (executes immediately).
    fn place_instrument_order(&self, order: &OrderRequest) -> Result<OrderPlacement, BrokerError>;

    /// Place a fund order (settles on the reported on-account date).
    fn place_fund_order(&self, order: &OrderRequest) -> Result<FundPlacement, BrokerError>;

    /// Current state of a placed order.
    fn order_status(&self, account: &AccountId, order: &OrderId) -> Result<OrderState, BrokerError>;

    /// Holdings and cash of the account identified by its URL parameter.
    fn account_positions(&self, account_url: &str) -> Result<AccountPositions, BrokerError>;

    /// Map an account URL parameter to the id used for order placement.
    fn resolve_account(&self, account_url: &str) -> Result<AccountId, BrokerError>;

    /// Underlying tracked by a leveraged instrument.
    fn underlying_for(&self, instrument: &AssetId) -> Result<AssetId, BrokerError>;
}

/// An authenticated session hold, released on drop.
///
/// ```ignore
/// let session = SessionLease::acquire(&broker)?;
/// let positions = session.account_positions("abc123")?;
/// // session ends here
/// ```
pub struct SessionLease<'a, B: Brokerage + ?Sized> {
    broker: &'a B,
}

impl<'a, B: Brokerage + ?Sized> SessionLease<'a, B> {
    /// Authenticate and hold the session until the lease is dropped.
    pub fn acquire(broker: &'a B) -> Result<Self, BrokerError> {
        broker.authenticate()?;
        Ok(Self { broker })
    }
}

impl<B: Brokerage + ?Sized> Deref for SessionLease<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.broker
    }
}

impl<B: Brokerage + ?Sized> Drop for SessionLease<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.broker.end_session() {
            warn!("Failed to end brokerage session: {e}");
        }
    }
}
