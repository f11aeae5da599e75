//! Execution orchestrator: signals → targets → trades → confirm → execute.
//!
//! This is the main workflow that ties together all components.

use std::fmt;
use std::thread;

use log::{info, warn};
use serde_json::json;
use trendbook::{
    AssetId, AssetSignal, TradeInstruction, allocate_cash, normalize_positions, plan_trades, rank,
    select_targets,
};
use trendbook_broker::{AccountId, Brokerage, SessionLease};

use crate::audit::{self, AuditLog};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::instruments::resolve_instrument;
use crate::orders::{RetryPolicy, SettlementPolicy};
use crate::positions::{Holdings, fetch_holdings};
use crate::signals::gather_signals;
use crate::trade::{ExecutionContext, TradeReport, execute_trade};

/// Options for a rebalance run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub force: bool,
}

/// Everything decided before the first order is placed.
#[derive(Debug, Clone)]
pub struct Plan {
    pub signals: Vec<AssetSignal>,
    pub targets: Vec<AssetId>,
    pub account: AccountId,
    pub holdings: Holdings,
    pub trades: Vec<TradeInstruction>,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub targets: Vec<AssetId>,
    pub planned: Vec<TradeInstruction>,
    /// Empty on dry runs.
    pub executed: Vec<TradeReport>,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.executed.iter().filter(|r| r.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.executed.len() - self.completed()
    }

    pub fn stranded(&self) -> usize {
        self.executed.iter().filter(|r| r.is_stranded()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TRADE OUTCOMES:")?;
        for (i, report) in self.executed.iter().enumerate() {
            writeln!(f, "  {:>3}  {report}", i + 1)?;
        }
        write!(
            f,
            "{} completed, {} failed",
            self.completed(),
            self.failed()
        )?;
        let stranded = self.stranded();
        if stranded > 0 {
            write!(f, " ({stranded} sold without buying; proceeds left as cash)")?;
        }
        Ok(())
    }
}

/// Rank the universe, read holdings and plan the swaps.
///
/// Any failure here is fatal: no order is placed on an incomplete plan.
pub fn plan<B: Brokerage + ?Sized>(config: &Config, broker: &B) -> Result<Plan> {
    let settings = &config.settings;
    let backup = &settings.backup_asset;

    let signals = gather_signals(broker, &config.assets, settings)?;
    let targets = select_targets(&signals, settings.agg, backup)?;

    let session = SessionLease::acquire(broker)?;
    let account = session.resolve_account(&config.account.url)?;
    let holdings = fetch_holdings(&*session, &config.account.url, backup)?;

    let normalized = normalize_positions(holdings.positions.clone(), settings.agg, backup)?;
    let mut trades = plan_trades(&normalized, &targets, &config.assets, backup, |asset| {
        resolve_instrument(&*session, asset, config.execution.candidate_limit)
    })?;
    allocate_cash(&mut trades, holdings.cash, config.execution.cash_buffer);

    Ok(Plan {
        signals,
        targets,
        account,
        holdings,
        trades,
    })
}

/// Run every trade on its own thread and wait for all of them.
///
/// Trades share nothing but the brokerage. A failed trade does not affect its
/// siblings. With a run timeout configured, a watchdog cancels `cancel` when
/// it expires.
pub fn execute_trades<B: Brokerage + ?Sized>(
    config: &Config,
    broker: &B,
    account: &AccountId,
    trades: Vec<TradeInstruction>,
    cancel: &CancelToken,
) -> Vec<TradeReport> {
    let backup = &config.settings.backup_asset;
    let ctx = ExecutionContext {
        broker,
        account,
        backup,
        retry: RetryPolicy::from_config(&config.execution),
        settlement: SettlementPolicy::from_config(&config.execution),
        cancel,
    };
    let finished = CancelToken::new();

    thread::scope(|s| {
        if let Some(timeout) = config.execution.run_timeout() {
            let finished = &finished;
            s.spawn(move || {
                if finished.sleep(timeout) {
                    warn!("Run timeout of {}s reached, cancelling", timeout.as_secs());
                    cancel.cancel();
                }
            });
        }

        let ctx = &ctx;
        let handles: Vec<_> = trades
            .into_iter()
            .map(|trade| {
                let kind = trade.kind(backup);
                let fallback = trade.clone();
                (s.spawn(move || execute_trade(ctx, trade)), fallback, kind)
            })
            .collect();

        let reports: Vec<TradeReport> = handles
            .into_iter()
            .map(|(handle, trade, kind)| {
                handle
                    .join()
                    .unwrap_or_else(|_| TradeReport::panicked(trade, kind))
            })
            .collect();

        finished.cancel();
        reports
    })
}

/// Execute a full rebalance run.
pub fn run<B: Brokerage + ?Sized>(
    config: &Config,
    broker: &B,
    opts: &RunOptions,
    cancel: &CancelToken,
) -> Result<RunReport> {
    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, &config.account.url, opts.dry_run)?;

    let plan = match plan(config, broker) {
        Ok(plan) => plan,
        Err(e) => {
            audit.log("run_failed", json!({ "error": e.to_string() }))?;
            return Err(e);
        }
    };

    audit::log_signals(&mut audit, &plan.signals)?;
    audit::log_positions(&mut audit, &plan.holdings.positions, plan.holdings.cash)?;
    audit::log_targets(&mut audit, &plan.targets)?;
    audit::log_trades(&mut audit, &plan.trades)?;

    display_signals(config, &plan.signals);
    display_holdings(&plan.holdings);
    display_targets(config, &plan.targets);

    let mut report = RunReport {
        targets: plan.targets.clone(),
        planned: plan.trades.clone(),
        executed: Vec::new(),
    };

    if plan.trades.is_empty() {
        println!("\nNo rebalancing needed: holdings match targets.");
        audit.log_simple("no_rebalance_needed")?;
        audit::log_run_completed(&mut audit, 0, 0, 0)?;
        return Ok(report);
    }

    display_plan(config, &plan.trades);

    if opts.dry_run {
        println!("\n[DRY RUN] No orders placed.");
        return Ok(report);
    }

    if !opts.force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Execute?")
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;

        audit.log("user_confirmed", json!({ "approved": confirmed }))?;
        if !confirmed {
            return Err(Error::Aborted("Aborted.".into()));
        }
    }

    if cancel.is_cancelled() {
        audit.log_simple("run_interrupted")?;
        return Err(Error::Aborted("Interrupted before any order was placed.".into()));
    }

    info!("Executing {} trades", plan.trades.len());
    report.executed = execute_trades(config, broker, &plan.account, plan.trades, cancel);

    for trade in &report.executed {
        audit::log_trade_finished(&mut audit, trade)?;
    }
    audit::log_run_completed(
        &mut audit,
        report.completed(),
        report.failed(),
        report.stranded(),
    )?;

    println!("\n{report}");
    println!("Audit logged to {}", config.audit_path().display());
    Ok(report)
}

/// Print the ranked universe and the resulting targets.
pub fn show_signals<B: Brokerage + ?Sized>(config: &Config, broker: &B) -> Result<Vec<AssetId>> {
    let settings = &config.settings;
    let signals = gather_signals(broker, &config.assets, settings)?;
    let targets = select_targets(&signals, settings.agg, &settings.backup_asset)?;

    display_signals(config, &signals);
    display_targets(config, &targets);
    Ok(targets)
}

/// Print translated holdings and free cash.
pub fn show_positions<B: Brokerage + ?Sized>(config: &Config, broker: &B) -> Result<Holdings> {
    let session = SessionLease::acquire(broker)?;
    let holdings = fetch_holdings(
        &*session,
        &config.account.url,
        &config.settings.backup_asset,
    )?;

    println!("Account {}:\n", config.account.url);
    display_holdings(&holdings);
    Ok(holdings)
}

/// Authenticate, resolve the account and end the session.
pub fn check_status<B: Brokerage + ?Sized>(config: &Config, broker: &B) -> Result<AccountId> {
    print!("Authenticating... ");
    let session = SessionLease::acquire(broker)?;
    println!("OK");

    let account = session.resolve_account(&config.account.url)?;
    println!("Account {} resolves to {account}", config.account.url);
    Ok(account)
}

// === Display ===

fn display_signals(config: &Config, signals: &[AssetSignal]) {
    println!(
        "SIGNALS ({} change, {}-day SMA):",
        config.settings.lookback_period, config.settings.sma_filter_length
    );
    println!(
        "  {:>3}  {:20} {:>10} {:>10} {:>10}",
        "#", "Asset", "Id", "Change", "Rel. SMA"
    );
    for (i, s) in rank(signals).into_iter().enumerate() {
        println!(
            "  {:>3}  {:20} {:>10} {:>9.2}% {:>10.4}{}",
            i + 1,
            s.asset.name,
            s.asset.asset_id,
            (s.percentage_change - 1.0) * 100.0,
            s.relative_sma,
            if s.in_uptrend() { "" } else { "  (below SMA)" },
        );
    }
}

fn display_targets(config: &Config, targets: &[AssetId]) {
    let s = &config.settings;
    println!(
        "\nTARGETS for the next {} {}:",
        s.hold_period, s.hold_period_type
    );
    for id in targets {
        let name = config
            .assets
            .iter()
            .find(|a| &a.asset_id == id)
            .map(|a| a.name.as_str())
            .unwrap_or("backup");
        println!("  {id:>10}  {name}");
    }
}

fn display_holdings(holdings: &Holdings) {
    if holdings.positions.is_empty() {
        println!("No positions.");
    } else {
        println!("\nCURRENT HOLDINGS:");
        for p in &holdings.positions {
            println!(
                "  {:>10} tracks {:>10}  {:>10.2} units  {:>12.2}",
                p.orderbook_id, p.underlying_id, p.volume, p.value
            );
        }
    }
    println!("  Free cash: {:.2}", holdings.cash);
}

fn display_plan(config: &Config, trades: &[TradeInstruction]) {
    println!("\nTRADES:");
    println!(
        "  {:>3}  {:22} {:>10} {:>10} {:>12} {:>10}",
        "#", "Kind", "Sell", "Buy", "Value", "Extra"
    );
    for (i, t) in trades.iter().enumerate() {
        println!(
            "  {:>3}  {:22} {:>10} {:>10} {:>12.2} {:>10.2}",
            i + 1,
            t.kind(&config.settings.backup_asset).to_string(),
            t.sell_asset,
            t.buy_asset,
            t.sell_value,
            t.extra_buy_cash,
        );
    }
}
