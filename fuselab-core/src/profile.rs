//! Strategy profiles: data consumed by the one shared decision machine.
//!
//! A profile is plain configuration: adding a third profile means writing a
//! new value (or a TOML table), never new simulation code.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised when validating a profile before simulation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProfileError {
    #[error("profile name must not be empty")]
    EmptyName,

    #[error("profile '{profile}': min_aligned_signals must be in 1..=4, got {value}")]
    MinAlignedSignals { profile: String, value: usize },

    #[error("profile '{profile}': position_size_pct must be in (0, 1], got {value}")]
    PositionSize { profile: String, value: f64 },

    #[error("profile '{profile}': stop_loss_pct must be in (0, 1), got {value}")]
    StopLoss { profile: String, value: f64 },

    #[error("profile '{profile}': trailing_stop_window must be >= 1")]
    TrailingWindow { profile: String },

    #[error("profile '{profile}': exit rule must contain at least one non-empty clause")]
    EmptyExitRule { profile: String },

    #[error(
        "profile '{profile}': RSI thresholds must satisfy 0 <= oversold < overbought <= 100, got {oversold}/{overbought}"
    )]
    Thresholds {
        profile: String,
        oversold: f64,
        overbought: f64,
    },
}

/// One primitive condition of an indicator take-profit rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCondition {
    /// RSI above the profile's overbought threshold.
    RsiOverbought,
    /// Close at or above the upper Bollinger band.
    UpperBandTouch,
    MacdBearCross,
    /// Close strictly below the middle Bollinger band.
    CloseBelowMiddleBand,
}

impl ExitCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitCondition::RsiOverbought => "rsi_overbought",
            ExitCondition::UpperBandTouch => "upper_band_touch",
            ExitCondition::MacdBearCross => "macd_bear_cross",
            ExitCondition::CloseBelowMiddleBand => "close_below_middle_band",
        }
    }
}

/// Take-profit rule in disjunctive normal form: the rule holds when every
/// condition of at least one clause holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRule {
    pub any_of: Vec<Vec<ExitCondition>>,
}

impl ExitRule {
    pub fn new(any_of: Vec<Vec<ExitCondition>>) -> Self {
        Self { any_of }
    }

    /// Evaluate the rule against a predicate for each primitive condition.
    pub fn holds(&self, mut condition: impl FnMut(ExitCondition) -> bool) -> bool {
        self.any_of
            .iter()
            .any(|clause| !clause.is_empty() && clause.iter().all(|&c| condition(c)))
    }

    fn is_well_formed(&self) -> bool {
        !self.any_of.is_empty() && self.any_of.iter().all(|clause| !clause.is_empty())
    }
}

impl fmt::Display for ExitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses: Vec<String> = self
            .any_of
            .iter()
            .map(|clause| {
                let terms: Vec<&str> = clause.iter().map(|c| c.as_str()).collect();
                if terms.len() > 1 {
                    format!("({})", terms.join(" AND "))
                } else {
                    terms.join("")
                }
            })
            .collect();
        f.write_str(&clauses.join(" OR "))
    }
}

/// RSI levels used by the oversold/overbought sub-signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 40.0,
            rsi_overbought: 70.0,
        }
    }
}

/// Named strategy configuration. Immutable once a simulation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    pub name: String,
    /// Entry fires when at least this many of the four entry signals align.
    pub min_aligned_signals: usize,
    /// Fraction of the capital base allocated per entry.
    pub position_size_pct: f64,
    /// Fractional loss from entry that forces an exit.
    pub stop_loss_pct: f64,
    /// SMA window used as the trailing stop reference.
    pub trailing_stop_window: usize,
    pub exit_rule: ExitRule,
    #[serde(default)]
    pub thresholds: SignalThresholds,
}

impl StrategyProfile {
    /// Few, high-conviction entries with a wide trailing reference.
    pub fn conservative() -> Self {
        Self {
            name: "conservative".into(),
            min_aligned_signals: 3,
            position_size_pct: 0.01,
            stop_loss_pct: 0.05,
            trailing_stop_window: 50,
            exit_rule: ExitRule::new(vec![
                vec![ExitCondition::RsiOverbought, ExitCondition::UpperBandTouch],
                vec![ExitCondition::MacdBearCross],
            ]),
            thresholds: SignalThresholds::default(),
        }
    }

    /// More frequent entries, bigger positions, tighter stops.
    pub fn aggressive() -> Self {
        Self {
            name: "aggressive".into(),
            min_aligned_signals: 2,
            position_size_pct: 0.03,
            stop_loss_pct: 0.03,
            trailing_stop_window: 20,
            exit_rule: ExitRule::new(vec![
                vec![ExitCondition::RsiOverbought],
                vec![ExitCondition::MacdBearCross],
                vec![ExitCondition::CloseBelowMiddleBand],
            ]),
            thresholds: SignalThresholds::default(),
        }
    }

    pub fn canonical() -> Vec<StrategyProfile> {
        vec![Self::conservative(), Self::aggressive()]
    }

    /// Look up a canonical profile by case-insensitive name.
    pub fn by_name(name: &str) -> Option<StrategyProfile> {
        Self::canonical()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let profile = || self.name.clone();
        if self.name.trim().is_empty() {
            return Err(ProfileError::EmptyName);
        }
        if !(1..=4).contains(&self.min_aligned_signals) {
            return Err(ProfileError::MinAlignedSignals {
                profile: profile(),
                value: self.min_aligned_signals,
            });
        }
        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 1.0) {
            return Err(ProfileError::PositionSize {
                profile: profile(),
                value: self.position_size_pct,
            });
        }
        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0) {
            return Err(ProfileError::StopLoss {
                profile: profile(),
                value: self.stop_loss_pct,
            });
        }
        if self.trailing_stop_window == 0 {
            return Err(ProfileError::TrailingWindow { profile: profile() });
        }
        if !self.exit_rule.is_well_formed() {
            return Err(ProfileError::EmptyExitRule { profile: profile() });
        }
        let SignalThresholds {
            rsi_oversold,
            rsi_overbought,
        } = self.thresholds;
        if !(rsi_oversold >= 0.0 && rsi_oversold < rsi_overbought && rsi_overbought <= 100.0) {
            return Err(ProfileError::Thresholds {
                profile: profile(),
                oversold: rsi_oversold,
                overbought: rsi_overbought,
            });
        }
        Ok(())
    }
}
