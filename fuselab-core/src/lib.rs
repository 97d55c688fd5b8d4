//! FuseLab Core: indicators, signal fusion, decision engine, ledger.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, feature rows, positions, trades, snapshots)
//! - Indicator library and feature frame builder
//! - Strategy profiles as plain data
//! - Signal evaluator fusing indicators with ML forecasts
//! - Flat/Long decision machine with ordered exit precedence
//! - Portfolio ledger and the day-by-day simulation loop

pub mod benchmark;
pub mod domain;
pub mod engine;
pub mod features;
pub mod fingerprint;
pub mod indicators;
pub mod profile;
pub mod signals;

pub use engine::{simulate, DayIssue, EngineError, SimulationConfig, SimulationResult};
pub use features::{build_features, FeatureConfig, FeatureError, Predictions};
pub use profile::{ExitCondition, ExitRule, ProfileError, SignalThresholds, StrategyProfile};
pub use signals::PredictionKind;
