//! Backtesting engine: one ticker, one profile, one day at a time.
//!
//! The engine consumes precomputed feature rows and runs the daily loop:
//!
//! 1. Validate the day (bad closes and undefined indicators skip the decision)
//! 2. Evaluate signals and let the decision machine pick an action
//! 3. Apply the action to the ledger and mark the portfolio to market
//!
//! No I/O happens inside the loop and nothing is revised after the fact.

pub mod cost_model;
pub mod decision;
pub mod error;
pub mod ledger;
pub mod loop_runner;

pub use cost_model::CostModel;
pub use decision::{Action, DecisionMachine};
pub use error::{DayIssue, EngineError};
pub use ledger::Ledger;
pub use loop_runner::{required_sma_windows, simulate, SimulationConfig, SimulationResult};
