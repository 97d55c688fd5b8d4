//! Signal evaluator.
//!
//! Entry signals: trend_up, macd_bull_cross, oversold, ml_bullish.
//! Exit signals: overbought, macd_bear_cross, ml_bearish.
//!
//! Crossovers compare today's row with the prior row. A MACD cross only counts
//! when the line has been on the far side of zero since the previous cross in
//! the same direction; `MacdLatch` remembers that.

use crate::domain::FeatureRow;
use crate::profile::{ExitCondition, SignalThresholds};
use serde::{Deserialize, Serialize};

use super::ml::{direction, merge, Direction, PredictionKind};

/// Rolling MACD state for one ticker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdLatch {
    /// MACD line was below zero on some day since the last bullish cross.
    pub dipped_below_zero: bool,
    /// MACD line was above zero on some day since the last bearish cross.
    pub rose_above_zero: bool,
}

impl MacdLatch {
    fn advance(&mut self, macd: f64, bull_fired: bool, bear_fired: bool) {
        self.dipped_below_zero = !bull_fired && (self.dipped_below_zero || macd < 0.0);
        self.rose_above_zero = !bear_fired && (self.rose_above_zero || macd > 0.0);
    }
}

/// Every sub-signal for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSet {
    // ── Entry ──
    pub trend_up: bool,
    pub macd_bull_cross: bool,
    pub oversold: bool,
    pub ml_bullish: bool,

    // ── Exit ──
    pub overbought: bool,
    pub macd_bear_cross: bool,
    pub ml_bearish: bool,

    // ── Take-profit primitives ──
    pub rsi_overbought: bool,
    pub upper_band_touch: bool,
    pub close_below_middle_band: bool,

    /// No forecast was available; both ML flags are neutral.
    pub prediction_missing: bool,
}

impl SignalSet {
    pub fn entry_count(&self) -> usize {
        [self.trend_up, self.macd_bull_cross, self.oversold, self.ml_bullish]
            .iter()
            .filter(|&&s| s)
            .count()
    }

    pub fn exit_count(&self) -> usize {
        [self.overbought, self.macd_bear_cross, self.ml_bearish]
            .iter()
            .filter(|&&s| s)
            .count()
    }

    /// Value of one take-profit primitive.
    pub fn condition(&self, condition: ExitCondition) -> bool {
        match condition {
            ExitCondition::RsiOverbought => self.rsi_overbought,
            ExitCondition::UpperBandTouch => self.upper_band_touch,
            ExitCondition::MacdBearCross => self.macd_bear_cross,
            ExitCondition::CloseBelowMiddleBand => self.close_below_middle_band,
        }
    }
}

/// Stateless evaluator; the latch is passed in by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalEvaluator {
    pub thresholds: SignalThresholds,
    pub prediction_kind: PredictionKind,
}

impl SignalEvaluator {
    pub fn new(thresholds: SignalThresholds, prediction_kind: PredictionKind) -> Self {
        Self {
            thresholds,
            prediction_kind,
        }
    }

    /// Evaluate `row` given the prior row (if any) and advance `latch`.
    ///
    /// Must be called once per complete row, in date order.
    pub fn evaluate(
        &self,
        row: &FeatureRow,
        prev: Option<&FeatureRow>,
        latch: &mut MacdLatch,
    ) -> SignalSet {
        let close = row.close();
        let has_bands = row.bands_have_width();

        let trend_up = matches!(
            (row.sma(200), row.sma(50)),
            (Some(long), Some(short)) if close > long && close > short
        );

        let (crossed_up, crossed_down) = match prev {
            Some(p) => (
                p.macd <= p.macd_signal && row.macd > row.macd_signal,
                p.macd >= p.macd_signal && row.macd < row.macd_signal,
            ),
            None => (false, false),
        };
        let macd_bull_cross = crossed_up && row.macd_histogram > 0.0 && latch.dipped_below_zero;
        let macd_bear_cross = crossed_down && row.macd_histogram < 0.0 && latch.rose_above_zero;
        latch.advance(row.macd, macd_bull_cross, macd_bear_cross);

        let lower_band_touch = has_bands && close <= row.bollinger_lower;
        let upper_band_touch = has_bands && close >= row.bollinger_upper;
        let rsi_overbought = row.rsi > self.thresholds.rsi_overbought;
        let oversold = row.rsi < self.thresholds.rsi_oversold || lower_band_touch;
        let overbought = rsi_overbought && upper_band_touch;

        let ml = merge(
            row.prediction
                .and_then(|p| direction(p, close, self.prediction_kind)),
            row.secondary_prediction
                .and_then(|p| direction(p, close, self.prediction_kind)),
        );

        SignalSet {
            trend_up,
            macd_bull_cross,
            oversold,
            ml_bullish: ml == Some(Direction::Up),
            overbought,
            macd_bear_cross,
            ml_bearish: ml == Some(Direction::Down),
            rsi_overbought,
            upper_band_touch,
            close_below_middle_band: close < row.bollinger_middle,
            prediction_missing: ml.is_none(),
        }
    }
}

impl Default for SignalEvaluator {
    fn default() -> Self {
        Self::new(SignalThresholds::default(), PredictionKind::Price)
    }
}
