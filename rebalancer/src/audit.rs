//! JSONL audit trail logging.
//!
//! Each rebalancer run appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use trendbook::{AssetId, AssetSignal, Position, TradeInstruction};

use crate::error::Result;
use crate::trade::TradeReport;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, json!({}))
    }
}

pub fn log_run_started(audit: &mut AuditLog, account_url: &str, dry_run: bool) -> Result<()> {
    audit.log(
        "run_started",
        json!({
            "account": account_url,
            "dry_run": dry_run,
        }),
    )
}

pub fn log_positions(audit: &mut AuditLog, positions: &[Position], cash: f64) -> Result<()> {
    let data: Vec<_> = positions
        .iter()
        .map(|p| {
            json!({
                "orderbook_id": p.orderbook_id.as_str(),
                "underlying_id": p.underlying_id.as_str(),
                "value": p.value,
                "volume": p.volume,
            })
        })
        .collect();

    audit.log("positions_fetched", json!({ "positions": data, "cash": cash }))
}

pub fn log_signals(audit: &mut AuditLog, signals: &[AssetSignal]) -> Result<()> {
    let data: Vec<_> = signals
        .iter()
        .map(|s| {
            json!({
                "asset_id": s.asset.asset_id.as_str(),
                "name": s.asset.name,
                "change": s.percentage_change,
                "relative_sma": s.relative_sma,
            })
        })
        .collect();

    audit.log("signals_computed", json!({ "signals": data }))
}

pub fn log_targets(audit: &mut AuditLog, targets: &[AssetId]) -> Result<()> {
    let ids: Vec<&str> = targets.iter().map(AssetId::as_str).collect();
    audit.log("targets_selected", json!({ "targets": ids }))
}

pub fn log_trades(audit: &mut AuditLog, trades: &[TradeInstruction]) -> Result<()> {
    let data: Vec<_> = trades
        .iter()
        .map(|t| {
            json!({
                "sell": t.sell_asset.as_str(),
                "buy": t.buy_asset.as_str(),
                "sell_value": t.sell_value,
                "volume": t.volume,
                "extra_buy_cash": t.extra_buy_cash,
            })
        })
        .collect();

    audit.log("trades_planned", json!({ "trades": data }))
}

pub fn log_trade_finished(audit: &mut AuditLog, report: &TradeReport) -> Result<()> {
    let failure = report.failure.as_ref().map(|f| {
        json!({
            "during": f.during.to_string(),
            "phase": f.phase.to_string(),
            "error": f.error.to_string(),
            "last_state": f.last_state.as_ref().map(|s| s.to_string()),
        })
    });

    audit.log(
        "trade_finished",
        json!({
            "sell": report.trade.sell_asset.as_str(),
            "buy": report.trade.buy_asset.as_str(),
            "kind": report.kind.to_string(),
            "state": report.state.to_string(),
            "sell_order": report.sell_order.as_ref().map(|id| id.to_string()),
            "buy_order": report.buy_order.as_ref().map(|id| id.to_string()),
            "failure": failure,
        }),
    )
}

pub fn log_run_completed(
    audit: &mut AuditLog,
    completed: usize,
    failed: usize,
    stranded: usize,
) -> Result<()> {
    audit.log(
        "run_completed",
        json!({
            "completed": completed,
            "failed": failed,
            "stranded": stranded,
        }),
    )
}
