//! TOML configuration loading and validation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashSet;
use serde::Deserialize;
use trendbook::{Asset, AssetId, LookbackPeriod};
use trendbook_broker::avanza::AvanzaCredentials;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub settings: Settings,
    pub assets: Vec<Asset>,
    pub account: AccountConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Strategy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Number of holdings (N).
    pub agg: usize,
    pub lookback_period: LookbackPeriod,
    /// SMA window in trading days.
    pub sma_filter_length: usize,
    pub backup_asset: AssetId,
    #[serde(default = "default_hold_period")]
    pub hold_period: u32,
    #[serde(default)]
    pub hold_period_type: HoldPeriodType,
}

fn default_hold_period() -> u32 {
    1
}

/// Unit of the hold period. Scheduling is external; this is only reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HoldPeriodType {
    Days,
    Weeks,
    #[default]
    Months,
}

impl fmt::Display for HoldPeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldPeriodType::Days => write!(f, "days"),
            HoldPeriodType::Weeks => write!(f, "weeks"),
            HoldPeriodType::Months => write!(f, "months"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// URL parameter id of the account.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff")]
    pub retry_backoff_secs: u64,
    /// Local hour on the on-account date when fund orders count as settled.
    #[serde(default = "default_settlement_hour")]
    pub settlement_hour: u32,
    /// Share of each cash allotment held back.
    #[serde(default = "default_cash_buffer")]
    pub cash_buffer: f64,
    #[serde(default = "default_max_wait_days")]
    pub max_settlement_wait_days: i64,
    /// 0 = no limit.
    #[serde(default)]
    pub run_timeout_secs: u64,
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: u32,
}

fn default_max_attempts() -> u32 {
    10
}
fn default_backoff() -> u64 {
    10
}
fn default_settlement_hour() -> u32 {
    11
}
fn default_cash_buffer() -> f64 {
    0.05
}
fn default_max_wait_days() -> i64 {
    7
}
fn default_candidate_limit() -> u32 {
    20
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_backoff(),
            settlement_hour: default_settlement_hour(),
            cash_buffer: default_cash_buffer(),
            max_settlement_wait_days: default_max_wait_days(),
            run_timeout_secs: 0,
            candidate_limit: default_candidate_limit(),
        }
    }
}

impl ExecutionConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("auth.toml")
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        let s = &self.settings;
        if s.agg == 0 {
            return Err(Error::Config("agg must be > 0".into()));
        }
        if self.assets.len() < s.agg {
            return Err(Error::Config(format!(
                "universe has {} assets, fewer than agg = {}",
                self.assets.len(),
                s.agg
            )));
        }
        if s.sma_filter_length == 0 {
            return Err(Error::Config("sma_filter_length must be > 0".into()));
        }
        if s.backup_asset.is_empty() {
            return Err(Error::Config("backup_asset must not be empty".into()));
        }

        let mut seen = FxHashSet::default();
        for asset in &self.assets {
            if asset.asset_id.is_empty() {
                return Err(Error::Config(format!("asset {} has an empty id", asset.name)));
            }
            if !seen.insert(&asset.asset_id) {
                return Err(Error::Config(format!("duplicate asset id {}", asset.asset_id)));
            }
            if asset.asset_id == s.backup_asset {
                return Err(Error::Config(format!(
                    "backup_asset {} is also a universe asset",
                    asset.asset_id
                )));
            }
            if asset.target_lev == 0 {
                return Err(Error::Config(format!(
                    "target_lev of {} must be > 0",
                    asset.asset_id
                )));
            }
        }

        if self.account.url.is_empty() {
            return Err(Error::Config("account url must not be empty".into()));
        }

        let e = &self.execution;
        if e.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be > 0".into()));
        }
        if e.settlement_hour > 23 {
            return Err(Error::Config("settlement_hour must be in 0..=23".into()));
        }
        if !(0.0..1.0).contains(&e.cash_buffer) {
            return Err(Error::Config("cash_buffer must be in [0.0, 1.0)".into()));
        }
        if e.max_settlement_wait_days < 0 {
            return Err(Error::Config("max_settlement_wait_days must be >= 0".into()));
        }
        if e.candidate_limit == 0 {
            return Err(Error::Config("candidate_limit must be > 0".into()));
        }
        Ok(())
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}

/// Read brokerage login credentials from their own TOML file.
pub fn load_credentials(path: &Path) -> Result<AvanzaCredentials> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::CredentialsRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendbook::InstrumentSearch;

    fn example_toml() -> &'static str {
        r#"
[settings]
agg = 2
lookback_period = "THREE_MONTHS"
sma_filter_length = 200
backup_asset = "CASH"
hold_period = 1
hold_period_type = "MONTHS"

[[assets]]
asset = "OMXS30"
asset_id = "19002"
target_lev = 2

[[assets]]
asset = "S&P 500"
asset_id = "155458"
target_lev = 2
search = { kind = "name_query", query = "SP500" }

[[assets]]
asset = "DAX"
asset_id = "18981"
target_lev = 3

[account]
url = "abc123"

[execution]
max_attempts = 10
retry_backoff_secs = 10
settlement_hour = 11
cash_buffer = 0.05

[logging]
dir = "./logs"
audit_file = "audit.jsonl"
"#
    }

    #[test]
    fn parse_example_config() {
        let config = Config::parse(example_toml()).unwrap();
        assert_eq!(config.settings.agg, 2);
        assert_eq!(config.settings.lookback_period, LookbackPeriod::ThreeMonths);
        assert_eq!(config.settings.backup_asset, AssetId::new("CASH"));
        assert_eq!(config.settings.hold_period_type, HoldPeriodType::Months);
        assert_eq!(config.assets.len(), 3);
        assert_eq!(config.assets[0].name, "OMXS30");
        assert_eq!(config.assets[0].search, InstrumentSearch::Underlying);
        assert_eq!(
            config.assets[1].search,
            InstrumentSearch::NameQuery {
                query: "SP500".into()
            }
        );
        assert_eq!(config.execution.max_attempts, 10);
        assert_eq!(config.account.url, "abc123");
    }

    #[test]
    fn optional_sections_default() {
        let toml = r#"
[settings]
agg = 1
lookback_period = "ONE_MONTH"
sma_filter_length = 50
backup_asset = "CASH"

[[assets]]
asset = "A"
asset_id = "1"
target_lev = 2

[account]
url = "x"
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.execution.retry_backoff(), Duration::from_secs(10));
        assert_eq!(config.execution.settlement_hour, 11);
        assert_eq!(config.execution.cash_buffer, 0.05);
        assert_eq!(config.execution.candidate_limit, 20);
        assert_eq!(config.execution.run_timeout(), None);
        assert_eq!(config.credentials.path, PathBuf::from("auth.toml"));
        assert_eq!(config.settings.hold_period, 1);
    }

    #[test]
    fn validate_catches_small_universe() {
        let toml = example_toml().replace("agg = 2", "agg = 4");
        assert!(matches!(Config::parse(&toml), Err(Error::Config(_))));
    }

    #[test]
    fn validate_catches_zero_agg() {
        let mut config = Config::parse(example_toml()).unwrap();
        config.settings.agg = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_duplicate_ids() {
        let toml = example_toml().replace("\"18981\"", "\"19002\"");
        let err = Config::parse(&toml).unwrap_err();
        assert!(err.to_string().contains("duplicate asset id 19002"));
    }

    #[test]
    fn validate_rejects_backup_in_universe() {
        let toml = example_toml().replace("\"18981\"", "\"CASH\"");
        let err = Config::parse(&toml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("backup_asset CASH"));
    }

    #[test]
    fn parses_unbounded_run_timeout() {
        let mut config = Config::parse(example_toml()).unwrap();
        config.execution.run_timeout_secs = 9_223_372_036_854_775_807;
        assert!(config.validate().is_ok());
        assert_eq!(
            config.execution.run_timeout(),
            Some(Duration::from_secs(9_223_372_036_854_775_807))
        );
    }

    #[test]
    fn validate_catches_zero_leverage() {
        let mut config = Config::parse(example_toml()).unwrap();
        config.assets[2].target_lev = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_bad_execution_settings() {
        let mut config = Config::parse(example_toml()).unwrap();
        config.execution.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::parse(example_toml()).unwrap();
        config.execution.settlement_hour = 24;
        assert!(config.validate().is_err());

        let mut config = Config::parse(example_toml()).unwrap();
        config.execution.cash_buffer = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_empty_account() {
        let mut config = Config::parse(example_toml()).unwrap();
        config.account.url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_lookback_rejected() {
        let toml = example_toml().replace("THREE_MONTHS", "TWO_DAYS");
        assert!(matches!(Config::parse(&toml), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn audit_path() {
        let config = Config::parse(example_toml()).unwrap();
        assert_eq!(config.audit_path(), PathBuf::from("./logs/audit.jsonl"));
    }

    #[test]
    fn credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.toml");
        std::fs::write(
            &path,
            "username = \"me\"\npassword = \"pw\"\ntotp_secret = \"GEZDGNBV\"\n",
        )
        .unwrap();

        let creds = load_credentials(&path).unwrap();
        assert_eq!(creds.username, "me");
        assert!(matches!(
            load_credentials(&dir.path().join("missing.toml")),
            Err(Error::CredentialsRead { .. })
        ));
    }
}
