//! Engine errors and per-day recoverable issues.

use crate::profile::ProfileError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors: the simulation for this ticker does not run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("insufficient data: {required} warm-up bars required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("invalid profile: {0}")]
    InvalidProfile(#[from] ProfileError),

    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),
}

/// Recoverable problems with a single day. The simulation records them and
/// moves on to the next day.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayIssue {
    #[error("{date}: entry skipped, {required:.2} required but {available:.2} available")]
    InsufficientCapital {
        date: NaiveDate,
        required: f64,
        available: f64,
    },

    #[error("{date}: no forecast, ML signals neutral")]
    MissingPrediction { date: NaiveDate },

    #[error("{date}: indicator '{field}' undefined, decision skipped")]
    MissingIndicator { date: NaiveDate, field: String },

    #[error("{date}: close is not a positive finite price, decision skipped")]
    InvalidClose { date: NaiveDate },
}

impl DayIssue {
    pub fn date(&self) -> NaiveDate {
        match self {
            DayIssue::InsufficientCapital { date, .. }
            | DayIssue::MissingPrediction { date }
            | DayIssue::MissingIndicator { date, .. }
            | DayIssue::InvalidClose { date } => *date,
        }
    }

    /// Stable snake_case label, used for summary counts.
    pub fn kind(&self) -> &'static str {
        match self {
            DayIssue::InsufficientCapital { .. } => "insufficient_capital",
            DayIssue::MissingPrediction { .. } => "missing_prediction",
            DayIssue::MissingIndicator { .. } => "missing_indicator",
            DayIssue::InvalidClose { .. } => "invalid_close",
        }
    }
}
