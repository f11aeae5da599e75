//! CLI entry point for the trendbook rebalancer.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::warn;

use trendbook_broker::avanza::AvanzaBroker;
use trendbook_rebalancer::cancel::{CancelToken, install_interrupt_handler};
use trendbook_rebalancer::config::{Config, load_credentials};
use trendbook_rebalancer::error::Error;
use trendbook_rebalancer::execution::{self, RunOptions};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Trend-following rotation through leveraged trackers")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank, plan, confirm, and execute the rotation
    Run {
        /// Show plan without executing
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,
    },

    /// Show ranked signals and the resulting targets
    Signals,

    /// Show current positions translated to underlyings
    Positions,

    /// Check brokerage login and account resolution
    Status,
}

fn connect(config: &Config) -> anyhow::Result<AvanzaBroker> {
    let credentials = load_credentials(&config.credentials.path)?;
    AvanzaBroker::new(credentials).context("failed to build brokerage client")
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let broker = match connect(&config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Run { dry_run, force } => {
            let opts = RunOptions { dry_run, force };
            let cancel = CancelToken::new();
            if let Err(e) = install_interrupt_handler(&cancel) {
                warn!("Failed to set Ctrl-C handler: {e}. Interrupts will kill the run.");
            }
            match execution::run(&config, &broker, &opts, &cancel) {
                Ok(report) if report.has_failures() => process::exit(3),
                other => other.map(drop),
            }
        }
        Command::Signals => execution::show_signals(&config, &broker).map(drop),
        Command::Positions => execution::show_positions(&config, &broker).map(drop),
        Command::Status => execution::check_status(&config, &broker).map(drop),
    };

    if let Err(e) = result {
        match &e {
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
