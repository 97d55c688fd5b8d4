//! Trade: a completed round-trip trade, appended to the log on every exit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which exit condition closed the position.
///
/// Variant order mirrors the evaluation precedence of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    MlBearish,
    TakeProfit,
}

impl ExitReason {
    pub const ALL: [ExitReason; 4] = [
        ExitReason::StopLoss,
        ExitReason::TrailingStop,
        ExitReason::MlBearish,
        ExitReason::TakeProfit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::MlBearish => "ml_bearish",
            ExitReason::TakeProfit => "take_profit",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete round-trip trade record: entry → exit. Never mutated after it
/// is appended to the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_date: NaiveDate,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_date: NaiveDate,
    pub exit_price: f64,

    // ── Size ──
    pub shares: u64,

    // ── PnL ──
    /// `shares * (exit_price - entry_price)`.
    pub pnl: f64,
    /// Round-trip commission (zero unless a cost model is configured).
    pub commission: f64,
    pub net_pnl: f64,

    // ── Duration ──
    pub bars_held: usize,

    pub exit_reason: ExitReason,
}

impl Trade {
    /// Return on the trade as a fraction of entry cost.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.shares == 0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.shares as f64)
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}
