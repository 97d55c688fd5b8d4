//! Day-by-day simulation loop: the heart of the backtesting engine.
//!
//! Three phases per day:
//! 1. Validate: skip the decision on a bad close or an undefined indicator
//! 2. Decide: evaluate signals, ask the state machine for an action, apply it
//! 3. Mark: append the end-of-day snapshot (every day, skipped or not)
//!
//! Crossovers compare today against the last row that reached phase 2. A bad
//! close is not part of any indicator series, so the row before it stays the
//! predecessor. A day with an undefined indicator breaks the chain: the next
//! day has no predecessor and cannot fire a cross.

use crate::domain::{FeatureRow, PortfolioSnapshot, PositionState, Trade};
use crate::profile::StrategyProfile;
use crate::signals::{MacdLatch, PredictionKind, SignalEvaluator};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::cost_model::CostModel;
use super::decision::{Action, DecisionMachine};
use super::error::{DayIssue, EngineError};
use super::ledger::Ledger;

/// Per-ticker simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Capital allocated to this ticker; also the sizing base for entries.
    pub capital_base: f64,
    pub prediction_kind: PredictionKind,
    pub costs: CostModel,
}

impl SimulationConfig {
    pub fn new(capital_base: f64) -> Self {
        Self {
            capital_base,
            prediction_kind: PredictionKind::Price,
            costs: CostModel::frictionless(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.capital_base.is_finite() && self.capital_base > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "capital_base must be positive, got {}",
                self.capital_base
            )));
        }
        if !self.costs.is_valid() {
            return Err(EngineError::InvalidConfig(
                "costs must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(100_000.0)
    }
}

/// Output of one profile over one ticker's feature rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub profile: String,
    pub initial_capital: f64,
    pub trades: Vec<Trade>,
    /// One snapshot per simulated day, in date order.
    pub snapshots: Vec<PortfolioSnapshot>,
    pub issues: Vec<DayIssue>,
    /// Leading rows excluded as indicator warm-up.
    pub warmup_rows: usize,
    /// Position still open after the last day, if any.
    pub final_position: PositionState,
}

impl SimulationResult {
    pub fn final_equity(&self) -> f64 {
        self.snapshots
            .last()
            .map_or(self.initial_capital, |s| s.total_equity)
    }

    pub fn equity_curve(&self) -> Vec<f64> {
        crate::domain::equity_values(&self.snapshots)
    }

    pub fn skipped_entries(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, DayIssue::InsufficientCapital { .. }))
            .count()
    }
}

/// SMA windows the machine reads for `profile`.
pub fn required_sma_windows(profile: &StrategyProfile) -> Vec<usize> {
    [50, 200, profile.trailing_stop_window]
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Run one profile over a ticker's feature rows.
///
/// Leading rows whose indicators are still warming up are dropped. Every
/// later row produces exactly one snapshot. A position still open after the
/// last row stays open (it is marked to market, not force-closed).
pub fn simulate(
    rows: &[FeatureRow],
    profile: &StrategyProfile,
    config: &SimulationConfig,
) -> Result<SimulationResult, EngineError> {
    profile.validate()?;
    config.validate()?;

    let windows = required_sma_windows(profile);
    let first = rows
        .iter()
        .position(|r| r.bar.has_tradable_close() && r.is_complete(&windows))
        .ok_or_else(|| EngineError::InsufficientData {
            required: windows.iter().copied().max().unwrap_or(0),
            available: rows.len(),
        })?;

    let evaluator = SignalEvaluator::new(profile.thresholds, config.prediction_kind);
    let machine =
        DecisionMachine::new(profile.clone(), config.capital_base).with_costs(config.costs);
    let mut ledger = Ledger::new(config.capital_base, config.costs);
    let mut latch = MacdLatch::default();
    let mut issues = Vec::new();
    let mut prev: Option<&FeatureRow> = None;
    let mut last_valid_close = rows[first].close();

    for row in &rows[first..] {
        let date = row.date();

        // ─── Phase 1: Validate ───
        if !row.bar.has_tradable_close() {
            let issue = DayIssue::InvalidClose { date };
            warn!("{}: {issue}", profile.name);
            issues.push(issue);
            ledger.mark(date, last_valid_close);
            continue;
        }
        let close = row.close();
        last_valid_close = close;

        if let Some(field) = row.missing_indicator(&windows) {
            let issue = DayIssue::MissingIndicator { date, field };
            warn!("{}: {issue}", profile.name);
            issues.push(issue);
            ledger.mark(date, close);
            prev = None;
            continue;
        }

        // ─── Phase 2: Decide ───
        let signals = evaluator.evaluate(row, prev, &mut latch);
        if signals.prediction_missing {
            let issue = DayIssue::MissingPrediction { date };
            debug!("{}: {issue}", profile.name);
            issues.push(issue);
        }

        let action = machine.decide(ledger.position(), &signals, row);
        match action {
            Action::Enter { shares } => {
                if let Err(issue) = ledger.enter(date, close, shares) {
                    warn!("{}: {issue}", profile.name);
                    issues.push(issue);
                }
            }
            Action::Exit { reason } => {
                if let Some(trade) = ledger.exit(date, close, reason) {
                    debug!(
                        "{}: {date} exit {reason} after {} bars, pnl {:.2}",
                        profile.name, trade.bars_held, trade.net_pnl
                    );
                }
            }
            Action::Hold => ledger.hold(close),
            Action::StayFlat => {}
        }

        // ─── Phase 3: Mark ───
        let snapshot = ledger.mark(date, close);
        debug!(
            "{}: {date} close={close:.2} entry={} exit={} {action:?} equity={:.2}",
            profile.name,
            signals.entry_count(),
            signals.exit_count(),
            snapshot.total_equity
        );
        debug_assert!(ledger.position().is_consistent());

        prev = Some(row);
    }

    let (trades, snapshots, final_position) = ledger.into_parts();
    Ok(SimulationResult {
        profile: profile.name.clone(),
        initial_capital: config.capital_base,
        trades,
        snapshots,
        issues,
        warmup_rows: first,
        final_position,
    })
}
