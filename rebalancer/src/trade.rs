//! Per-trade execution: sell leg, then buy leg, with settlement waits for fund legs.

use std::fmt;

use log::{error, info};
use trendbook::{AssetId, TradeInstruction, TradeKind};
use trendbook_broker::{AccountId, BrokerSide, Brokerage, OrderId, OrderState};

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::orders::{self, LegSpec, OrderSize, RetryPolicy, SettlementPolicy, Venue};

/// Lifecycle of one trade. `Failed` is terminal; failed trades are never resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    Pending,
    SellExecuting,
    BuyExecuting,
    Completed,
    Failed,
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeState::Pending => write!(f, "PENDING"),
            TradeState::SellExecuting => write!(f, "SELL_EXECUTING"),
            TradeState::BuyExecuting => write!(f, "BUY_EXECUTING"),
            TradeState::Completed => write!(f, "COMPLETED"),
            TradeState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Where a leg stood when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegPhase {
    Placing,
    AwaitingSettlement,
    Confirming,
}

impl fmt::Display for LegPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegPhase::Placing => write!(f, "placing"),
            LegPhase::AwaitingSettlement => write!(f, "awaiting settlement"),
            LegPhase::Confirming => write!(f, "confirming"),
        }
    }
}

/// Why a trade failed, and how far it got.
#[derive(Debug)]
pub struct TradeFailure {
    /// `SellExecuting` or `BuyExecuting`.
    pub during: TradeState,
    pub phase: LegPhase,
    pub error: Error,
    /// State of the placed order when its settlement wait was cancelled.
    pub last_state: Option<OrderState>,
}

/// Terminal outcome of one trade.
#[derive(Debug)]
pub struct TradeReport {
    pub trade: TradeInstruction,
    pub kind: TradeKind,
    pub state: TradeState,
    pub sell_order: Option<OrderId>,
    pub buy_order: Option<OrderId>,
    pub failure: Option<TradeFailure>,
}

impl TradeReport {
    pub fn error(&self) -> Option<&Error> {
        self.failure.as_ref().map(|f| &f.error)
    }

    pub fn is_completed(&self) -> bool {
        self.state == TradeState::Completed
    }

    /// The sell went through but the buy did not: proceeds sit idle.
    pub fn is_stranded(&self) -> bool {
        self.sell_order.is_some()
            && matches!(&self.failure, Some(f) if f.during == TradeState::BuyExecuting)
    }

    pub(crate) fn panicked(trade: TradeInstruction, kind: TradeKind) -> Self {
        Self {
            trade,
            kind,
            state: TradeState::Failed,
            sell_order: None,
            buy_order: None,
            failure: Some(TradeFailure {
                during: TradeState::Pending,
                phase: LegPhase::Placing,
                error: Error::TaskPanicked,
                last_state: None,
            }),
        }
    }
}

impl fmt::Display for TradeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.trade, self.kind, self.state)?;
        match &self.failure {
            Some(fail) => {
                write!(f, " during {} ({}): {}", fail.during, fail.phase, fail.error)?;
                if let Some(state) = &fail.last_state {
                    write!(f, " (order last seen {state})")?;
                }
                Ok(())
            }
            None => {
                if let (Some(sell), Some(buy)) = (&self.sell_order, &self.buy_order) {
                    write!(f, " (sell {sell}, buy {buy})")?;
                }
                Ok(())
            }
        }
    }
}

/// Shared, read-only inputs of every trade task.
pub struct ExecutionContext<'a, B: Brokerage + ?Sized> {
    pub broker: &'a B,
    pub account: &'a AccountId,
    pub backup: &'a AssetId,
    pub retry: RetryPolicy,
    pub settlement: SettlementPolicy,
    pub cancel: &'a CancelToken,
}

struct LegFailure {
    phase: LegPhase,
    error: Error,
    /// Set when the order was accepted before the failure.
    placed: Option<OrderId>,
    last_state: Option<OrderState>,
}

/// Drives one trade through its state machine.
struct TradeRun<'c, 'a, B: Brokerage + ?Sized> {
    ctx: &'c ExecutionContext<'a, B>,
    report: TradeReport,
}

impl<B: Brokerage + ?Sized> TradeRun<'_, '_, B> {
    fn transition(&mut self, next: TradeState) {
        info!(
            "{} -> {}: {} => {}",
            self.report.trade.sell_asset, self.report.trade.buy_asset, self.report.state, next
        );
        self.report.state = next;
    }

    fn fail(&mut self, failure: LegFailure) {
        let during = self.report.state;
        match during {
            TradeState::SellExecuting => self.report.sell_order = failure.placed,
            TradeState::BuyExecuting => self.report.buy_order = failure.placed,
            _ => {}
        }
        error!(
            "Trade {} failed during {during} ({}): {}",
            self.report.trade, failure.phase, failure.error
        );
        self.report.failure = Some(TradeFailure {
            during,
            phase: failure.phase,
            error: failure.error,
            last_state: failure.last_state,
        });
        self.report.state = TradeState::Failed;
    }

    /// Place, optionally wait for settlement, confirm.
    fn leg(&self, spec: LegSpec<'_>, settles: bool) -> std::result::Result<OrderId, LegFailure> {
        let ctx = self.ctx;
        let placed = orders::place_order(ctx.broker, ctx.account, spec, &ctx.retry, ctx.cancel)
            .map_err(|error| LegFailure {
                phase: LegPhase::Placing,
                error,
                placed: None,
                last_state: None,
            })?;

        if settles {
            if let Err(error) = orders::await_settlement(&placed, &ctx.settlement, ctx.cancel) {
                // The order stays live at the broker; record where it stood.
                let last_state = match error {
                    Error::Cancelled => orders::observe_state(ctx.broker, ctx.account, &placed),
                    _ => None,
                };
                return Err(LegFailure {
                    phase: LegPhase::AwaitingSettlement,
                    error,
                    placed: Some(placed.order_id),
                    last_state,
                });
            }
        }
        orders::confirm_executed(ctx.broker, ctx.account, &placed).map_err(|error| LegFailure {
            phase: LegPhase::Confirming,
            error,
            placed: Some(placed.order_id.clone()),
            last_state: None,
        })?;
        Ok(placed.order_id)
    }

    fn run(mut self) -> TradeReport {
        let trade = self.report.trade.clone();
        let backup = self.ctx.backup;
        let kind = self.report.kind;

        let sell_size = OrderSize::Units(trade.volume.max(0.0).floor() as u64);
        let buy_size = OrderSize::Value(trade.buy_value());

        // Fund legs are always sized by value.
        let (sell, sell_settles) = match kind {
            TradeKind::CashToInstrument => (
                LegSpec {
                    venue: Venue::Fund,
                    asset: backup,
                    side: BrokerSide::Sell,
                    size: OrderSize::Value(trade.sell_value),
                },
                true,
            ),
            _ => (
                LegSpec {
                    venue: Venue::Instrument,
                    asset: &trade.sell_asset,
                    side: BrokerSide::Sell,
                    size: sell_size,
                },
                false,
            ),
        };
        let (buy, buy_settles) = match kind {
            TradeKind::InstrumentToCash => (
                LegSpec {
                    venue: Venue::Fund,
                    asset: backup,
                    side: BrokerSide::Buy,
                    size: buy_size,
                },
                true,
            ),
            _ => (
                LegSpec {
                    venue: Venue::Instrument,
                    asset: &trade.buy_asset,
                    side: BrokerSide::Buy,
                    size: buy_size,
                },
                false,
            ),
        };

        self.transition(TradeState::SellExecuting);
        match self.leg(sell, sell_settles) {
            Ok(id) => self.report.sell_order = Some(id),
            Err(failure) => {
                self.fail(failure);
                return self.report;
            }
        }

        self.transition(TradeState::BuyExecuting);
        match self.leg(buy, buy_settles) {
            Ok(id) => self.report.buy_order = Some(id),
            Err(failure) => {
                self.fail(failure);
                return self.report;
            }
        }

        self.transition(TradeState::Completed);
        self.report
    }
}

/// Execute one trade to a terminal state. Never panics on broker failure;
/// every error ends up in the report.
pub fn execute_trade<B: Brokerage + ?Sized>(
    ctx: &ExecutionContext<'_, B>,
    trade: TradeInstruction,
) -> TradeReport {
    let kind = trade.kind(ctx.backup);
    TradeRun {
        ctx,
        report: TradeReport {
            trade,
            kind,
            state: TradeState::Pending,
            sell_order: None,
            buy_order: None,
            failure: None,
        },
    }
    .run()
}
