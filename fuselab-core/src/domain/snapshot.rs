//! PortfolioSnapshot: one point on the daily equity curve.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// End-of-day portfolio state. The append-only sequence of snapshots is the
/// equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub date: NaiveDate,
    pub cash: f64,
    pub position_value: f64,
    pub total_equity: f64,
    /// Close used for mark-to-market (last valid close on a skipped day).
    pub close: f64,
}

impl PortfolioSnapshot {
    /// Build a snapshot; `total_equity` is always derived, never passed in.
    pub fn new(date: NaiveDate, cash: f64, position_value: f64, close: f64) -> Self {
        Self {
            date,
            cash,
            position_value,
            total_equity: cash + position_value,
            close,
        }
    }
}

/// Extract the equity values from a snapshot sequence.
pub fn equity_values(snapshots: &[PortfolioSnapshot]) -> Vec<f64> {
    snapshots.iter().map(|s| s.total_equity).collect()
}
