//! Order placement with retries, execution confirmation and settlement waits.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use log::{info, warn};
use trendbook::AssetId;
use trendbook_broker::{
    AccountId, BrokerError, BrokerSide, Brokerage, FundPlacement, OrderId, OrderPlacement,
    OrderRequest, OrderState, PlacementStatus, SessionLease,
};

use crate::cancel::CancelToken;
use crate::config::ExecutionConfig;
use crate::error::{Error, Result};

/// How often and how patiently placement is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.retry_backoff(),
        }
    }
}

/// When fund orders count as settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementPolicy {
    /// Local hour on the on-account date.
    pub hour: u32,
    /// Longer waits are refused.
    pub max_wait_days: i64,
}

impl SettlementPolicy {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            hour: config.settlement_hour,
            max_wait_days: config.max_settlement_wait_days,
        }
    }
}

/// Orderbook kind, which decides the placement endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Instrument,
    Fund,
}

/// Size of an order, in units or in account currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderSize {
    Units(u64),
    Value(f64),
}

/// Everything needed to place and follow one leg.
#[derive(Debug, Clone, Copy)]
pub struct LegSpec<'a> {
    pub venue: Venue,
    pub asset: &'a AssetId,
    pub side: BrokerSide,
    pub size: OrderSize,
}

/// A leg the broker accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub asset: AssetId,
    pub order_id: OrderId,
    pub volume: u64,
    pub price: f64,
    pub attempts: u32,
    /// On-account date; fund orders only.
    pub settlement_date: Option<NaiveDate>,
}

struct Placement {
    status: PlacementStatus,
    order_id: Option<OrderId>,
    settlement_date: Option<NaiveDate>,
}

impl From<OrderPlacement> for Placement {
    fn from(p: OrderPlacement) -> Self {
        Self {
            status: p.status,
            order_id: p.order_id,
            settlement_date: None,
        }
    }
}

impl From<FundPlacement> for Placement {
    fn from(p: FundPlacement) -> Self {
        Self {
            status: p.status,
            order_id: p.order_id,
            settlement_date: p.settlement_date,
        }
    }
}

/// Units bought by `value` at `price`, rounded down.
pub fn units_for_value(value: f64, price: f64) -> Option<u64> {
    if !value.is_finite() || !price.is_finite() || price <= 0.0 || value < 0.0 {
        return None;
    }
    Some((value / price).floor() as u64)
}

/// Place one leg, retrying rejected or failed attempts.
///
/// The last price is read once, before the first attempt, and reused for every
/// retry. A value-sized order is converted to `floor(value / price)` units.
/// Cancellation is checked before each attempt and interrupts the backoff.
pub fn place_order<B: Brokerage + ?Sized>(
    broker: &B,
    account: &AccountId,
    leg: LegSpec<'_>,
    policy: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<PlacedOrder> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let session = SessionLease::acquire(broker)?;
    let asset = leg.asset;
    let not_placed = |reason: String| Error::PlacementFailed {
        asset: asset.clone(),
        attempts: 0,
        reason,
    };

    // TODO: refresh the price between attempts once the broker exposes a
    // quote timestamp to judge staleness.
    let price = session
        .last_price(asset)
        .map_err(|e| not_placed(format!("price lookup failed: {e}")))?;
    let volume = match leg.size {
        OrderSize::Units(units) => units,
        OrderSize::Value(value) => units_for_value(value, price)
            .ok_or_else(|| not_placed(format!("cannot size {value:.2} at price {price}")))?,
    };
    if volume == 0 {
        return Err(not_placed(format!("order has no units at price {price}")));
    }

    let request = OrderRequest {
        account: account.clone(),
        orderbook_id: asset.clone(),
        side: leg.side,
        volume,
        price,
    };

    let mut reason = String::new();
    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let result: std::result::Result<Placement, BrokerError> = match leg.venue {
            Venue::Instrument => session.place_instrument_order(&request).map(Into::into),
            Venue::Fund => session.place_fund_order(&request).map(Into::into),
        };

        match result {
            Ok(p) => match p.status {
                PlacementStatus::Success => {
                    let order_id = p.order_id.ok_or_else(|| Error::ExecutionMismatch {
                        asset: asset.clone(),
                        detail: "placement succeeded without an order id".into(),
                    })?;
                    info!(
                        "{} {volume} {asset} @ {price} placed as order {order_id} (attempt {attempt})",
                        leg.side
                    );
                    return Ok(PlacedOrder {
                        asset: asset.clone(),
                        order_id,
                        volume,
                        price,
                        attempts: attempt,
                        settlement_date: p.settlement_date,
                    });
                }
                PlacementStatus::Rejected(status) => reason = status,
            },
            Err(e) => reason = e.to_string(),
        }

        warn!(
            "{} {asset} attempt {attempt}/{} failed: {reason}",
            leg.side, policy.max_attempts
        );
        if attempt < policy.max_attempts && !cancel.sleep(policy.backoff) {
            return Err(Error::Cancelled);
        }
    }

    Err(Error::PlacementFailed {
        asset: asset.clone(),
        attempts: policy.max_attempts,
        reason,
    })
}

/// Check that a placed order reached `FULLY_EXECUTED`.
///
/// Any other state, or a failed lookup, is an execution mismatch. Not retried.
pub fn confirm_executed<B: Brokerage + ?Sized>(
    broker: &B,
    account: &AccountId,
    order: &PlacedOrder,
) -> Result<()> {
    let session = SessionLease::acquire(broker)?;
    let mismatch = |detail: String| Error::ExecutionMismatch {
        asset: order.asset.clone(),
        detail,
    };

    match session.order_status(account, &order.order_id) {
        Ok(OrderState::FullyExecuted) => {
            info!("Order {} for {} fully executed", order.order_id, order.asset);
            Ok(())
        }
        Ok(state) => Err(mismatch(format!("order {} is {state}", order.order_id))),
        Err(e) => Err(mismatch(format!(
            "status of order {} unavailable: {e}",
            order.order_id
        ))),
    }
}

/// Read the current state of a placed order, `None` if it cannot be read.
pub fn observe_state<B: Brokerage + ?Sized>(
    broker: &B,
    account: &AccountId,
    order: &PlacedOrder,
) -> Option<OrderState> {
    let state = SessionLease::acquire(broker)
        .and_then(|session| session.order_status(account, &order.order_id));
    match state {
        Ok(state) => {
            info!("Order {} for {} is {state}", order.order_id, order.asset);
            Some(state)
        }
        Err(e) => {
            warn!("Could not read order {} for {}: {e}", order.order_id, order.asset);
            None
        }
    }
}

/// `hour`:00 local time on `date`.
pub fn settlement_deadline(date: NaiveDate, hour: u32) -> Option<DateTime<Local>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    Local.from_local_datetime(&naive).earliest()
}

/// Time left until a fund order settles, zero if already past.
pub fn settlement_wait(
    order: &PlacedOrder,
    policy: &SettlementPolicy,
    now: DateTime<Local>,
) -> Result<Duration> {
    let mismatch = |detail: String| Error::ExecutionMismatch {
        asset: order.asset.clone(),
        detail,
    };

    let date = order
        .settlement_date
        .ok_or_else(|| mismatch(format!("order {} has no on-account date", order.order_id)))?;
    let deadline = settlement_deadline(date, policy.hour)
        .ok_or_else(|| mismatch(format!("no local time {}:00 on {date}", policy.hour)))?;

    let wait = deadline - now;
    if wait <= chrono::Duration::zero() {
        return Ok(Duration::ZERO);
    }
    if wait.num_seconds() > policy.max_wait_days.saturating_mul(86_400) {
        return Err(mismatch(format!(
            "on-account date {date} is more than {} days away",
            policy.max_wait_days
        )));
    }
    wait.to_std()
        .map_err(|e| mismatch(format!("invalid wait until {deadline}: {e}")))
}

/// Block until the fund order settles. Cancellation interrupts the wait.
pub fn await_settlement(
    order: &PlacedOrder,
    policy: &SettlementPolicy,
    cancel: &CancelToken,
) -> Result<()> {
    let wait = settlement_wait(order, policy, Local::now())?;
    if wait.is_zero() {
        return Ok(());
    }
    info!(
        "Waiting {}s for order {} ({}) to settle",
        wait.as_secs(),
        order.order_id,
        order.asset
    );
    if cancel.sleep(wait) {
        Ok(())
    } else {
        Err(Error::Cancelled)
    }
}
