//! Cost model: slippage and commission.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Commission is a flat amount per side (entry and exit each pay once).

use serde::{Deserialize, Serialize};

/// Execution friction applied by the ledger. Frictionless by default.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostModel {
    /// Slippage in basis points, applied directionally.
    #[serde(default)]
    pub slippage_bps: f64,
    /// Flat commission per fill.
    #[serde(default)]
    pub commission_per_trade: f64,
}

impl CostModel {
    pub fn new(slippage_bps: f64, commission_per_trade: f64) -> Self {
        Self {
            slippage_bps,
            commission_per_trade,
        }
    }

    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn is_frictionless(&self) -> bool {
        self.slippage_bps == 0.0 && self.commission_per_trade == 0.0
    }

    /// Both components finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.slippage_bps.is_finite()
            && self.slippage_bps >= 0.0
            && self.commission_per_trade.is_finite()
            && self.commission_per_trade >= 0.0
    }

    /// Price paid when buying at `close`.
    pub fn buy_price(&self, close: f64) -> f64 {
        close * (1.0 + self.slippage_bps / 10_000.0)
    }

    /// Price received when selling at `close`.
    pub fn sell_price(&self, close: f64) -> f64 {
        close * (1.0 - self.slippage_bps / 10_000.0)
    }
}
