//! Configuration types for tick-trader

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Alpaca paper trading endpoint
pub const DEFAULT_API_URL: &str = "https://paper-api.alpaca.markets";

/// Environment variable holding the API key id
pub const ENV_KEY_ID: &str = "APCA_API_KEY_ID";
/// Environment variable holding the API secret key
pub const ENV_SECRET_KEY: &str = "APCA_API_SECRET_KEY";

/// Configuration errors (all fatal at startup)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("missing API credentials: {0}")]
    Credentials(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    pub strategy: StrategyConfig,
    pub threshold: Option<ThresholdConfig>,
    pub allocation: Option<AllocationConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Brokerage API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// File containing the API key id
    pub key_id_file: Option<PathBuf>,
    /// File containing the API secret key
    pub secret_key_file: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            key_id_file: None,
            secret_key_file: None,
        }
    }
}

/// API key pair
#[derive(Clone)]
pub struct Credentials {
    pub key_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl ApiConfig {
    /// Resolve credentials from the configured key files, falling back to
    /// the `APCA_API_KEY_ID` / `APCA_API_SECRET_KEY` environment variables
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let key_id = resolve_secret(self.key_id_file.as_deref(), ENV_KEY_ID)?;
        let secret_key = resolve_secret(self.secret_key_file.as_deref(), ENV_SECRET_KEY)?;
        Ok(Credentials { key_id, secret_key })
    }
}

fn resolve_secret(file: Option<&Path>, env_var: &str) -> Result<String, ConfigError> {
    let value = match file {
        Some(path) => std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?,
        None => std::env::var(env_var).map_err(|_| {
            ConfigError::Credentials(format!("no key file configured and {} is unset", env_var))
        })?,
    };

    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ConfigError::Credentials(format!("empty value for {}", env_var)));
    }
    Ok(value)
}

/// Asset tracking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Price points kept per asset
    #[serde(default = "default_history_length")]
    pub history_length: usize,
}

fn default_history_length() -> usize {
    crate::asset::DEFAULT_HISTORY_CAPACITY
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            history_length: default_history_length(),
        }
    }
}

/// Which decision engine drives the bot
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Threshold,
    Allocation,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Threshold => write!(f, "threshold"),
            StrategyKind::Allocation => write!(f, "allocation"),
        }
    }
}

/// Strategy runner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Seconds between ticks
    pub tick_secs: u64,
    /// Directory holding persisted state
    pub work_dir: PathBuf,
}

/// Threshold strategy parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    /// Dollar amount per buy
    pub base_buy: Decimal,
    /// Dollar amount per sell (defaults to `base_buy`)
    pub base_sell: Option<Decimal>,
    /// Fractional drop before buying
    pub thresh_buy: Decimal,
    /// Fractional rise before selling
    pub thresh_sell: Decimal,
    #[serde(default = "default_threshold_cooldown")]
    pub order_cooldown_secs: u64,
    #[serde(default = "default_history_minimum")]
    pub history_minimum: usize,
    #[serde(default = "default_buy_streak_maximum")]
    pub buy_streak_maximum: usize,
    pub symbols: Vec<String>,
}

/// Longest accepted order cooldown (one year)
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 3600;

fn default_threshold_cooldown() -> u64 {
    3600
}
fn default_history_minimum() -> usize {
    10
}
fn default_buy_streak_maximum() -> usize {
    3
}

/// Denominator used when normalizing allocation targets
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetBasis {
    /// Sum of targets for assets actually owned (reweights unowned targets away)
    #[default]
    Owned,
    /// Sum of all configured targets
    Configured,
}

/// Target-allocation strategy parameters
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
    #[serde(default = "default_allocation_cooldown")]
    pub order_cooldown_secs: u64,
    #[serde(default)]
    pub target_basis: TargetBasis,
    /// Target percent (0-100) per symbol; empty means an equal split
    #[serde(default)]
    pub targets: BTreeMap<String, Decimal>,
}

fn default_allocation_cooldown() -> u64 {
    24 * 3600
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy.tick_secs == 0 {
            return invalid("strategy.tick_secs must be greater than zero");
        }
        if self.assets.history_length == 0 {
            return invalid("assets.history_length must be greater than zero");
        }
        if self.api.timeout_secs == 0 {
            return invalid("api.timeout_secs must be greater than zero");
        }

        match self.strategy.kind {
            StrategyKind::Threshold => match &self.threshold {
                Some(t) => t.validate(self.assets.history_length),
                None => invalid("strategy.kind = \"threshold\" requires a [threshold] section"),
            },
            StrategyKind::Allocation => match &self.allocation {
                Some(a) => a.validate(),
                None => invalid("strategy.kind = \"allocation\" requires an [allocation] section"),
            },
        }
    }
}

impl ThresholdConfig {
    fn validate(&self, history_length: usize) -> Result<(), ConfigError> {
        if self.base_buy <= Decimal::ZERO {
            return invalid("threshold.base_buy must be positive");
        }
        if matches!(self.base_sell, Some(s) if s <= Decimal::ZERO) {
            return invalid("threshold.base_sell must be positive");
        }
        for (name, value) in [("thresh_buy", self.thresh_buy), ("thresh_sell", self.thresh_sell)] {
            if value <= Decimal::ZERO || value >= Decimal::ONE {
                return invalid(format!("threshold.{} must be between 0 and 1", name));
            }
        }
        check_cooldown("threshold", self.order_cooldown_secs)?;
        if self.symbols.is_empty() {
            return invalid("threshold.symbols contains zero symbols");
        }
        if self.history_minimum > history_length {
            return invalid(format!(
                "threshold.history_minimum ({}) exceeds assets.history_length ({})",
                self.history_minimum, history_length
            ));
        }
        Ok(())
    }
}

impl AllocationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_cooldown("allocation", self.order_cooldown_secs)?;
        if self.targets.is_empty() {
            return Ok(());
        }
        if let Some((sym, _)) = self.targets.iter().find(|(_, p)| **p < Decimal::ZERO) {
            return invalid(format!("allocation.targets.{} is negative", sym));
        }
        let total: Decimal = self.targets.values().copied().sum();
        if total != dec!(100) {
            return invalid(format!("allocation.targets total {}, not 100.0", total));
        }
        Ok(())
    }
}

fn check_cooldown(section: &str, secs: u64) -> Result<(), ConfigError> {
    if secs > MAX_COOLDOWN_SECS {
        return invalid(format!(
            "{}.order_cooldown_secs ({}) exceeds the maximum of {}",
            section, secs, MAX_COOLDOWN_SECS
        ));
    }
    Ok(())
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}
