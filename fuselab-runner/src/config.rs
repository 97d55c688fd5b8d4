//! Serializable backtest configuration.
//!
//! A TOML file with four sections:
//!
//! ```toml
//! [backtest]
//! tickers = ["AAPL", "MSFT"]
//! initial_capital = 100000.0
//! risk_free_rate = 0.02
//! prediction_kind = "price"
//! strategy = "both"
//!
//! [data]
//! bars_dir = "data/bars"
//! predictions_dir = "data/lstm"
//! secondary_dir = "data/rf"
//!
//! [costs]
//! slippage_bps = 5.0
//!
//! [[profiles]]
//! name = "patient"
//! ...
//! ```

use chrono::NaiveDate;
use fuselab_core::engine::CostModel;
use fuselab_core::{PredictionKind, ProfileError, SimulationConfig, StrategyProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::metrics::DEFAULT_RISK_FREE_RATE;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Strategy selector that expands to both canonical profiles.
pub const BOTH_PROFILES: &str = "both";

/// Errors from reading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid profile: {0}")]
    Profile(#[from] ProfileError),
    #[error("unknown strategy '{0}' (expected conservative, aggressive, both or a [[profiles]] name)")]
    UnknownStrategy(String),
}

/// Complete configuration for one `run` or `compare` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub costs: CostModel,
    /// Custom profiles, selectable by name next to the canonical two.
    #[serde(default)]
    pub profiles: Vec<StrategyProfile>,
}

/// `[backtest]`: what to run and with how much capital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub tickers: Vec<String>,
    /// Total capital. A multi-ticker comparison splits it equally.
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub prediction_kind: PredictionKind,
    /// `conservative`, `aggressive`, `both`, or a custom profile name.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Inclusive date range; bars outside it are dropped.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// `[data]`: where each ticker's inputs live.
///
/// Files are looked up as `{dir}/{TICKER}.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default)]
    pub bars_dir: Option<PathBuf>,
    /// Primary (LSTM) forecasts.
    #[serde(default)]
    pub predictions_dir: Option<PathBuf>,
    /// Secondary (random forest) forecasts.
    #[serde(default)]
    pub secondary_dir: Option<PathBuf>,
    /// Generate deterministic synthetic bars and forecasts instead of reading files.
    #[serde(default)]
    pub synthetic: bool,
}

/// Resolved input locations for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSource {
    pub ticker: String,
    pub bars: Option<PathBuf>,
    pub primary: Option<PathBuf>,
    pub secondary: Option<PathBuf>,
    pub synthetic: bool,
}

fn default_capital() -> f64 {
    100_000.0
}

fn default_risk_free_rate() -> f64 {
    DEFAULT_RISK_FREE_RATE
}

fn default_strategy() -> String {
    BOTH_PROFILES.to_string()
}

impl BacktestSection {
    pub fn for_tickers(tickers: Vec<String>) -> Self {
        Self {
            tickers,
            initial_capital: default_capital(),
            risk_free_rate: default_risk_free_rate(),
            prediction_kind: PredictionKind::default(),
            strategy: default_strategy(),
            start_date: None,
            end_date: None,
        }
    }
}

impl DataSection {
    pub fn source_for(&self, ticker: &str) -> TickerSource {
        let file = |dir: &Option<PathBuf>| dir.as_ref().map(|d| d.join(format!("{ticker}.csv")));
        TickerSource {
            ticker: ticker.to_string(),
            bars: file(&self.bars_dir),
            primary: file(&self.predictions_dir),
            secondary: file(&self.secondary_dir),
            synthetic: self.synthetic,
        }
    }
}

impl BacktestConfig {
    /// Minimal config: the given tickers with every default.
    pub fn for_tickers(tickers: Vec<String>) -> Self {
        Self {
            backtest: BacktestSection::for_tickers(tickers),
            data: DataSection::default(),
            costs: CostModel::frictionless(),
            profiles: Vec::new(),
        }
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.tickers.is_empty() {
            return Err(ConfigError::Invalid("at least one ticker is required".into()));
        }
        if let Some(t) = bt.tickers.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("empty ticker symbol {t:?}")));
        }
        if !(bt.initial_capital.is_finite() && bt.initial_capital > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "initial_capital must be positive, got {}",
                bt.initial_capital
            )));
        }
        if !bt.risk_free_rate.is_finite() {
            return Err(ConfigError::Invalid("risk_free_rate must be finite".into()));
        }
        if let (Some(start), Some(end)) = (bt.start_date, bt.end_date) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "start_date {start} is after end_date {end}"
                )));
            }
        }
        if !self.costs.is_valid() {
            return Err(ConfigError::Invalid(
                "costs must be finite and non-negative".into(),
            ));
        }
        for profile in &self.profiles {
            profile.validate()?;
        }
        self.selected_profiles().map(|_| ())
    }

    /// Profiles named by `backtest.strategy`. Custom profiles shadow the
    /// canonical ones of the same name.
    pub fn selected_profiles(&self) -> Result<Vec<StrategyProfile>, ConfigError> {
        let name = self.backtest.strategy.trim().to_ascii_lowercase();
        if name == BOTH_PROFILES {
            return Ok(StrategyProfile::canonical());
        }
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(&name))
            .cloned()
            .or_else(|| StrategyProfile::by_name(&name))
            .map(|p| vec![p])
            .ok_or(ConfigError::UnknownStrategy(self.backtest.strategy.clone()))
    }

    /// Capital given to each ticker: the total split equally.
    pub fn capital_per_ticker(&self) -> f64 {
        self.backtest.initial_capital / self.backtest.tickers.len().max(1) as f64
    }

    pub fn simulation_config(&self, capital_base: f64) -> SimulationConfig {
        SimulationConfig {
            capital_base,
            prediction_kind: self.backtest.prediction_kind,
            costs: self.costs,
        }
    }

    /// Deterministic hash of the full configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
