//! Backtest runner: wires together data loading, features, engine, and metrics.
//!
//! Entry points:
//! - `run_ticker()`: load one ticker and run every selected profile over it. Used by CLI.
//! - `run_profile()`: one profile over pre-built feature rows. Used by comparisons and tests.

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fuselab_core::benchmark::buy_and_hold;
use fuselab_core::domain::{equity_values, FeatureRow, PortfolioSnapshot, PositionState, Trade};
use fuselab_core::engine::required_sma_windows;
use fuselab_core::fingerprint::{output_fingerprint, profile_hash, Fingerprint};
use fuselab_core::{
    build_features, simulate, DayIssue, EngineError, FeatureConfig, FeatureError,
    SimulationConfig, StrategyProfile,
};

use crate::config::{BacktestConfig, ConfigError, TickerSource};
use crate::data_loader::{load_ticker, LoadError, TickerData};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("feature error: {0}")]
    Features(#[from] FeatureError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one profile over one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticker: String,
    pub profile: StrategyProfile,
    pub initial_capital: f64,
    pub risk_free_rate: f64,
    /// First and last simulated day (after warm-up).
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: usize,
    pub warmup_bars: usize,
    pub synthetic: bool,

    pub metrics: PerformanceMetrics,
    /// Buy-and-hold over the same simulated days and capital.
    pub benchmark: PerformanceMetrics,

    pub trades: Vec<Trade>,
    pub snapshots: Vec<PortfolioSnapshot>,
    pub issues: Vec<DayIssue>,
    /// Position still open after the last day (marked, not closed).
    pub open_position: Option<PositionState>,

    pub dataset_hash: Fingerprint,
    pub profile_hash: Fingerprint,
    /// BLAKE3 over trades + snapshots; identical inputs give identical values.
    pub output_fingerprint: Fingerprint,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn equity_curve(&self) -> Vec<f64> {
        equity_values(&self.snapshots)
    }

    pub fn skipped_entries(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, DayIssue::InsufficientCapital { .. }))
            .count()
    }
}

/// Feature config that covers every profile's trailing-stop window.
pub fn feature_config_for(profiles: &[StrategyProfile]) -> FeatureConfig {
    FeatureConfig::with_sma_windows(profiles.iter().flat_map(required_sma_windows))
}

/// Run one profile over pre-built feature rows.
pub fn run_profile(
    data: &TickerData,
    rows: &[FeatureRow],
    profile: &StrategyProfile,
    sim_config: &SimulationConfig,
    risk_free_rate: f64,
) -> Result<BacktestResult, RunError> {
    let sim = simulate(rows, profile, sim_config)?;

    let equity = sim.equity_curve();
    let metrics = PerformanceMetrics::compute(&equity, &sim.trades, risk_free_rate);

    let start_date = sim.snapshots.first().map(|s| s.date);
    let end_date = sim.snapshots.last().map(|s| s.date);
    let benchmark_bars: Vec<_> = data
        .bars
        .iter()
        .filter(|b| start_date.map_or(false, |s| b.date >= s))
        .cloned()
        .collect();
    let benchmark_curve = equity_values(&buy_and_hold(&benchmark_bars, sim_config.capital_base));
    let benchmark = PerformanceMetrics::compute(&benchmark_curve, &[], risk_free_rate);

    let output_fingerprint = output_fingerprint(&sim.trades, &sim.snapshots)?;
    let open_position = sim.final_position.is_long().then(|| sim.final_position.clone());

    info!(
        "{} [{}]: {} trades, return {:.2}%, sharpe {:.2}, max dd {:.2}% (buy & hold {:.2}%)",
        data.ticker,
        profile.name,
        metrics.trade_count,
        metrics.total_return * 100.0,
        metrics.sharpe,
        metrics.max_drawdown * 100.0,
        benchmark.total_return * 100.0,
    );
    if !sim.issues.is_empty() {
        info!(
            "{} [{}]: {} day issues ({} skipped entries)",
            data.ticker,
            profile.name,
            sim.issues.len(),
            sim.skipped_entries()
        );
    }

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        ticker: data.ticker.clone(),
        profile: profile.clone(),
        initial_capital: sim_config.capital_base,
        risk_free_rate,
        start_date,
        end_date,
        bar_count: data.bars.len(),
        warmup_bars: sim.warmup_rows,
        synthetic: data.synthetic,
        metrics,
        benchmark,
        trades: sim.trades,
        snapshots: sim.snapshots,
        issues: sim.issues,
        open_position,
        dataset_hash: data.dataset_hash.clone(),
        profile_hash: profile_hash(profile)?,
        output_fingerprint,
    })
}

/// Run every profile over already-loaded ticker data.
pub fn run_loaded(
    data: &TickerData,
    profiles: &[StrategyProfile],
    sim_config: &SimulationConfig,
    risk_free_rate: f64,
) -> Result<Vec<BacktestResult>, RunError> {
    let feature_config = feature_config_for(profiles);
    let rows = build_features(
        &data.bars,
        data.primary.as_ref(),
        data.secondary.as_ref(),
        &feature_config,
    )?;
    profiles
        .iter()
        .map(|profile| run_profile(data, &rows, profile, sim_config, risk_free_rate))
        .collect()
}

/// Load one ticker and run every profile selected by `config`.
///
/// `capital` is the ticker's own capital base.
pub fn run_ticker(
    config: &BacktestConfig,
    source: &TickerSource,
    capital: f64,
) -> Result<Vec<BacktestResult>, RunError> {
    let profiles = config.selected_profiles()?;
    let data = load_ticker(source, config.backtest.start_date, config.backtest.end_date)?;
    info!(
        "{}: {} bars, dataset {}{}",
        data.ticker,
        data.bars.len(),
        data.dataset_hash.short(),
        if data.synthetic { " (synthetic)" } else { "" }
    );
    run_loaded(
        &data,
        &profiles,
        &config.simulation_config(capital),
        config.backtest.risk_free_rate,
    )
}
