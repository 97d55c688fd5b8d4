//! FuseLab Runner: backtest orchestration, comparison, metrics, artifacts.
//!
//! This crate builds on `fuselab-core` to provide:
//! - TOML configuration with custom strategy profiles
//! - Bar and forecast loading from CSV, or deterministic synthetic data
//! - Single-ticker runner with buy-and-hold benchmark and fingerprints
//! - Performance summarizer (returns, drawdown, Sharpe, trade statistics)
//! - Parallel multi-ticker comparison with an equal-weight aggregate and
//!   custom-weight (ticker, profile) portfolios
//! - CSV/JSON artifact export

pub mod compare;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;

pub use compare::{
    combine, combine_weighted, run_comparison, CombineError, CombinedCurve, Comparison,
    PortfolioLeg, TickerFailure, WeightedPortfolio,
};
pub use config::{BacktestConfig, ConfigError, DataSection, TickerSource};
pub use data_loader::{load_ticker, LoadError, TickerData};
pub use export::{save_artifacts, save_comparison, save_weighted, Manifest, Summary};
pub use metrics::PerformanceMetrics;
pub use runner::{run_loaded, run_profile, run_ticker, BacktestResult, RunError};
