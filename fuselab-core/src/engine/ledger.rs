//! Position & portfolio ledger.
//!
//! Applies the machine's action to cash and the position, then marks the
//! portfolio to market once per day.
//!
//! Invariants:
//! - `cash + position_value == total_equity` in every snapshot
//! - cash never goes below zero: an entry must leave enough cash for the
//!   exit commission, and an exit never charges more than cash plus proceeds
//! - at most one open position (no pyramiding, no shorting)

use crate::domain::{ExitReason, PortfolioSnapshot, PositionState, Trade};
use chrono::NaiveDate;

use super::cost_model::CostModel;
use super::error::DayIssue;

#[derive(Debug, Clone)]
pub struct Ledger {
    capital_base: f64,
    cash: f64,
    position: PositionState,
    /// Commission paid on the open position's entry fill.
    entry_commission: f64,
    costs: CostModel,
    trades: Vec<Trade>,
    snapshots: Vec<PortfolioSnapshot>,
}

impl Ledger {
    pub fn new(capital_base: f64, costs: CostModel) -> Self {
        Self {
            capital_base,
            cash: capital_base,
            position: PositionState::flat(),
            entry_commission: 0.0,
            costs,
            trades: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn capital_base(&self) -> f64 {
        self.capital_base
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    /// Open a long position of `shares` at `close`.
    ///
    /// The cash must cover the fill, the entry commission and the exit
    /// commission still to come. A zero-share entry or one the cash cannot
    /// cover is rejected and the ledger is left untouched.
    pub fn enter(&mut self, date: NaiveDate, close: f64, shares: u64) -> Result<(), DayIssue> {
        debug_assert!(self.position.is_flat(), "entry while already long");
        let fill = self.costs.buy_price(close);
        let commission = self.costs.commission_per_trade;
        let cost = shares as f64 * fill + commission;
        let required = cost + commission;

        if shares == 0 || required > self.cash {
            return Err(DayIssue::InsufficientCapital {
                date,
                required,
                available: self.cash,
            });
        }

        self.cash -= cost;
        self.entry_commission = commission;
        self.position = PositionState::open_long(fill, date, shares);
        Ok(())
    }

    /// Close the open position at `close`, append the trade and go flat.
    ///
    /// Returns `None` when there is nothing to close.
    pub fn exit(&mut self, date: NaiveDate, close: f64, reason: ExitReason) -> Option<&Trade> {
        let entry_price = self.position.entry_price?;
        let entry_date = self.position.entry_date?;
        let shares = self.position.shares_held;

        let fill = self.costs.sell_price(close);
        let gross = self.cash + shares as f64 * fill;
        let exit_commission = self.costs.commission_per_trade.min(gross);
        self.cash = gross - exit_commission;

        let pnl = shares as f64 * (fill - entry_price);
        let commission = self.entry_commission + exit_commission;
        self.trades.push(Trade {
            entry_date,
            entry_price,
            exit_date: date,
            exit_price: fill,
            shares,
            pnl,
            commission,
            net_pnl: pnl - commission,
            bars_held: self.position.bars_held + 1,
            exit_reason: reason,
        });

        self.position = PositionState::flat();
        self.entry_commission = 0.0;
        self.trades.last()
    }

    /// Keep the position another day.
    pub fn hold(&mut self, close: f64) {
        if self.position.is_long() {
            self.position.record_hold(close);
        }
    }

    /// Append today's end-of-day snapshot, marking the position at `close`.
    pub fn mark(&mut self, date: NaiveDate, close: f64) -> &PortfolioSnapshot {
        let position_value = self.position.market_value(close);
        self.snapshots
            .push(PortfolioSnapshot::new(date, self.cash, position_value, close));
        let last = self.snapshots.len() - 1;
        &self.snapshots[last]
    }

    pub fn equity(&self, close: f64) -> f64 {
        self.cash + self.position.market_value(close)
    }

    /// Consume the ledger into its trade log, equity curve and final position.
    pub fn into_parts(self) -> (Vec<Trade>, Vec<PortfolioSnapshot>, PositionState) {
        (self.trades, self.snapshots, self.position)
    }
}
