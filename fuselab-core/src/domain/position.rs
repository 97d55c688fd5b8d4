//! PositionState: the single open-or-flat position of one simulated ticker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Whether the ticker currently holds shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    #[default]
    Flat,
    Long,
}

/// Position tracking for one ticker.
///
/// Invariants:
/// - `shares_held > 0` iff `status == Long`
/// - when `Flat`, every entry field is `None` (nothing leaks into the next
///   entry's trailing-stop bookkeeping)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PositionState {
    pub status: PositionStatus,
    pub entry_price: Option<f64>,
    pub entry_date: Option<NaiveDate>,
    pub shares_held: u64,
    pub highest_price_since_entry: Option<f64>,
    /// Trading days the position has been held after the entry day.
    pub bars_held: usize,
}

impl PositionState {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn open_long(entry_price: f64, entry_date: NaiveDate, shares: u64) -> Self {
        debug_assert!(shares > 0, "a long position must hold shares");
        Self {
            status: PositionStatus::Long,
            entry_price: Some(entry_price),
            entry_date: Some(entry_date),
            shares_held: shares,
            highest_price_since_entry: Some(entry_price),
            bars_held: 0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.status == PositionStatus::Flat
    }

    pub fn is_long(&self) -> bool {
        self.status == PositionStatus::Long
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares_held as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.entry_price {
            Some(entry) => self.shares_held as f64 * (price - entry),
            None => 0.0,
        }
    }

    /// Whether the price has closed above entry on some day since entry.
    pub fn has_traded_above_entry(&self) -> bool {
        matches!(
            (self.entry_price, self.highest_price_since_entry),
            (Some(entry), Some(high)) if high > entry
        )
    }

    /// Hold for another day: ratchet the high-water mark.
    pub fn record_hold(&mut self, close: f64) {
        if let Some(high) = self.highest_price_since_entry.as_mut() {
            if close > *high {
                *high = close;
            }
        }
        self.bars_held += 1;
    }

    /// Structural invariants; used by debug assertions and tests.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            PositionStatus::Flat => {
                self.shares_held == 0
                    && self.entry_price.is_none()
                    && self.entry_date.is_none()
                    && self.highest_price_since_entry.is_none()
            }
            PositionStatus::Long => {
                self.shares_held > 0
                    && self.entry_price.is_some()
                    && self.entry_date.is_some()
                    && self.highest_price_since_entry.is_some()
            }
        }
    }
}
