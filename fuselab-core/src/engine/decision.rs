//! Decision state machine: Flat/Long transitions for one day.
//!
//! Exit conditions are checked in a fixed order and the first one that holds
//! wins: stop-loss, trailing stop, ML-bearish, take-profit.

use crate::domain::{ExitReason, FeatureRow, PositionState, PositionStatus};
use crate::profile::StrategyProfile;

use super::cost_model::CostModel;
use crate::signals::SignalSet;
use serde::{Deserialize, Serialize};

/// What the ledger should do today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Enter { shares: u64 },
    Exit { reason: ExitReason },
    Hold,
    StayFlat,
}

/// One shared machine, parameterized by a profile.
#[derive(Debug, Clone)]
pub struct DecisionMachine {
    profile: StrategyProfile,
    capital_base: f64,
    costs: CostModel,
}

impl DecisionMachine {
    pub fn new(profile: StrategyProfile, capital_base: f64) -> Self {
        Self {
            profile,
            capital_base,
            costs: CostModel::frictionless(),
        }
    }

    /// Size entries against the slipped fill price and the entry commission.
    pub fn with_costs(mut self, costs: CostModel) -> Self {
        self.costs = costs;
        self
    }

    pub fn profile(&self) -> &StrategyProfile {
        &self.profile
    }

    /// Most the entry fill and its commission may spend.
    pub fn entry_budget(&self) -> f64 {
        self.capital_base * self.profile.position_size_pct
    }

    /// Shares an entry at `close` may buy.
    ///
    /// floor((budget - commission) / fill), where `fill` is the slipped buy
    /// price; frictionless this is floor(capital_base * size_pct / close).
    /// `shares * fill + commission` never exceeds the budget.
    pub fn entry_shares(&self, close: f64) -> u64 {
        if !(close.is_finite() && close > 0.0) {
            return 0;
        }
        let fill = self.costs.buy_price(close);
        let commission = self.costs.commission_per_trade;
        let budget = self.entry_budget();
        let spendable = budget - commission;
        if !(spendable > 0.0) {
            return 0;
        }
        let mut shares = (spendable / fill).floor() as u64;
        while shares > 0 && shares as f64 * fill + commission > budget {
            shares -= 1;
        }
        shares
    }

    pub fn decide(&self, position: &PositionState, signals: &SignalSet, row: &FeatureRow) -> Action {
        match position.status {
            PositionStatus::Flat => {
                if signals.entry_count() >= self.profile.min_aligned_signals {
                    Action::Enter {
                        shares: self.entry_shares(row.close()),
                    }
                } else {
                    Action::StayFlat
                }
            }
            PositionStatus::Long => match self.exit_reason(position, signals, row) {
                Some(reason) => Action::Exit { reason },
                None => Action::Hold,
            },
        }
    }

    /// First exit condition that holds for an open position, in precedence order.
    pub fn exit_reason(
        &self,
        position: &PositionState,
        signals: &SignalSet,
        row: &FeatureRow,
    ) -> Option<ExitReason> {
        let entry = position.entry_price?;
        let close = row.close();

        if close <= entry * (1.0 - self.profile.stop_loss_pct) {
            return Some(ExitReason::StopLoss);
        }

        let below_trailing = row
            .sma(self.profile.trailing_stop_window)
            .is_some_and(|sma| close <= sma);
        if position.has_traded_above_entry() && below_trailing {
            return Some(ExitReason::TrailingStop);
        }

        if signals.ml_bearish {
            return Some(ExitReason::MlBearish);
        }

        if self.profile.exit_rule.holds(|c| signals.condition(c)) {
            return Some(ExitReason::TakeProfit);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn row(close: f64, trailing_sma: f64) -> FeatureRow {
        let mut smas = BTreeMap::new();
        smas.insert(20, trailing_sma);
        smas.insert(50, trailing_sma);
        smas.insert(200, trailing_sma);
        FeatureRow {
            bar: Bar {
                date: date(10),
                open: close,
                high: close,
                low: close,
                close,
                volume: 500,
            },
            smas,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            rsi: 50.0,
            bollinger_lower: close - 3.0,
            bollinger_middle: close,
            bollinger_upper: close + 3.0,
            prediction: None,
            secondary_prediction: None,
        }
    }

    fn signals(entry: usize) -> SignalSet {
        SignalSet {
            trend_up: entry >= 1,
            oversold: entry >= 2,
            ml_bullish: entry >= 3,
            macd_bull_cross: entry >= 4,
            ..SignalSet::default()
        }
    }

    #[test]
    fn entry_needs_min_aligned_signals() {
        let conservative = DecisionMachine::new(StrategyProfile::conservative(), 100_000.0);
        let aggressive = DecisionMachine::new(StrategyProfile::aggressive(), 100_000.0);
        let flat = PositionState::flat();
        let r = row(100.0, 95.0);

        assert_eq!(conservative.decide(&flat, &signals(2), &r), Action::StayFlat);
        assert_eq!(aggressive.decide(&flat, &signals(2), &r), Action::Enter { shares: 30 });
        assert_eq!(conservative.decide(&flat, &signals(3), &r), Action::Enter { shares: 10 });
    }

    #[test]
    fn shares_are_floored() {
        let machine = DecisionMachine::new(StrategyProfile::aggressive(), 10_000.0);
        // 10_000 * 0.03 / 70 = 4.28
        assert_eq!(machine.entry_shares(70.0), 4);
        assert_eq!(machine.entry_shares(400.0), 0);
        assert_eq!(machine.entry_shares(f64::NAN), 0);
    }

    #[test]
    fn sizing_includes_slippage_and_commission() {
        let machine = DecisionMachine::new(StrategyProfile::aggressive(), 100_000.0)
            .with_costs(CostModel::new(10.0, 5.0));
        // (3_000 - 5) / 100.10 = 29.92
        let shares = machine.entry_shares(100.0);
        assert_eq!(shares, 29);
        let fill = CostModel::new(10.0, 5.0).buy_price(100.0);
        assert!(shares as f64 * fill + 5.0 <= machine.entry_budget());
    }

    #[test]
    fn commission_above_budget_buys_nothing() {
        let machine = DecisionMachine::new(StrategyProfile::conservative(), 1_000.0)
            .with_costs(CostModel::new(0.0, 10.0));
        assert_eq!(machine.entry_shares(1.0), 0);
    }

    #[test]
    fn stop_loss_at_94() {
        let machine = DecisionMachine::new(StrategyProfile::conservative(), 100_000.0);
        let pos = PositionState::open_long(100.0, date(1), 10);
        assert_eq!(
            machine.decide(&pos, &SignalSet::default(), &row(94.0, 90.0)),
            Action::Exit { reason: ExitReason::StopLoss }
        );
        assert_eq!(machine.decide(&pos, &SignalSet::default(), &row(96.0, 90.0)), Action::Hold);
    }

    #[test]
    fn stop_loss_beats_take_profit_and_ml() {
        let machine = DecisionMachine::new(StrategyProfile::aggressive(), 100_000.0);
        let pos = PositionState::open_long(100.0, date(1), 10);
        let set = SignalSet {
            ml_bearish: true,
            rsi_overbought: true,
            macd_bear_cross: true,
            ..SignalSet::default()
        };
        assert_eq!(
            machine.exit_reason(&pos, &set, &row(90.0, 80.0)),
            Some(ExitReason::StopLoss)
        );
    }

    #[test]
    fn trailing_stop_only_after_trading_above_entry() {
        let machine = DecisionMachine::new(StrategyProfile::aggressive(), 100_000.0);
        let mut pos = PositionState::open_long(100.0, date(1), 10);
        let r = row(99.0, 99.5);
        assert_eq!(machine.exit_reason(&pos, &SignalSet::default(), &r), None);

        pos.record_hold(104.0);
        assert_eq!(
            machine.exit_reason(&pos, &SignalSet::default(), &r),
            Some(ExitReason::TrailingStop)
        );
    }

    #[test]
    fn trailing_beats_ml_bearish() {
        let machine = DecisionMachine::new(StrategyProfile::aggressive(), 100_000.0);
        let mut pos = PositionState::open_long(100.0, date(1), 10);
        pos.record_hold(110.0);
        let set = SignalSet {
            ml_bearish: true,
            ..SignalSet::default()
        };
        assert_eq!(
            machine.exit_reason(&pos, &set, &row(101.0, 102.0)),
            Some(ExitReason::TrailingStop)
        );
        assert_eq!(
            machine.exit_reason(&pos, &set, &row(103.0, 102.0)),
            Some(ExitReason::MlBearish)
        );
    }

    #[test]
    fn ml_bearish_beats_take_profit() {
        let machine = DecisionMachine::new(StrategyProfile::aggressive(), 100_000.0);
        let pos = PositionState::open_long(100.0, date(1), 10);
        let set = SignalSet {
            ml_bearish: true,
            rsi_overbought: true,
            macd_bear_cross: true,
            close_below_middle_band: true,
            ..SignalSet::default()
        };
        let r = row(101.0, 95.0);
        assert!(machine.profile().exit_rule.holds(|c| set.condition(c)));
        assert_eq!(
            machine.decide(&pos, &set, &r),
            Action::Exit { reason: ExitReason::MlBearish }
        );
    }

    #[test]
    fn take_profit_follows_profile_rule() {
        let conservative = DecisionMachine::new(StrategyProfile::conservative(), 100_000.0);
        let aggressive = DecisionMachine::new(StrategyProfile::aggressive(), 100_000.0);
        let pos = PositionState::open_long(100.0, date(1), 10);
        let set = SignalSet {
            rsi_overbought: true,
            ..SignalSet::default()
        };
        let r = row(101.0, 95.0);
        assert_eq!(conservative.decide(&pos, &set, &r), Action::Hold);
        assert_eq!(
            aggressive.decide(&pos, &set, &r),
            Action::Exit { reason: ExitReason::TakeProfit }
        );
    }

    #[test]
    fn long_never_reenters() {
        let machine = DecisionMachine::new(StrategyProfile::aggressive(), 100_000.0);
        let pos = PositionState::open_long(100.0, date(1), 10);
        assert_eq!(machine.decide(&pos, &signals(4), &row(101.0, 95.0)), Action::Hold);
    }
}
