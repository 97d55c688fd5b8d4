//! FeatureRow: one day's aligned price, indicator and forecast record.
//!
//! Feature rows are consumed, not computed, by the decision engine. Indicator
//! fields use `f64::NAN` while their lookback window is still filling; such
//! rows are warm-up rows and never reach the state machine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::bar::Bar;

/// Per-day feature vector: the bar plus every derived field the signals read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub bar: Bar,
    /// Simple moving averages keyed by window length (always 50 and 200, plus
    /// any trailing-stop windows the profiles ask for).
    pub smas: BTreeMap<usize, f64>,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub rsi: f64,
    pub bollinger_lower: f64,
    pub bollinger_middle: f64,
    pub bollinger_upper: f64,
    /// Primary forecaster output for the next period (price or delta).
    pub prediction: Option<f64>,
    /// Independent secondary forecaster output, same semantics as `prediction`.
    pub secondary_prediction: Option<f64>,
}

impl FeatureRow {
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }

    /// SMA for `window`, if it was computed and is past its warm-up.
    pub fn sma(&self, window: usize) -> Option<f64> {
        self.smas.get(&window).copied().filter(|v| v.is_finite())
    }

    /// Name of the first indicator field that is not yet usable, if any.
    ///
    /// `sma_windows` lists the SMA windows the caller depends on; a window that
    /// was never computed counts as missing.
    pub fn missing_indicator(&self, sma_windows: &[usize]) -> Option<String> {
        for &window in sma_windows {
            if self.sma(window).is_none() {
                return Some(format!("sma_{window}"));
            }
        }
        let fields = [
            ("macd", self.macd),
            ("macd_signal", self.macd_signal),
            ("macd_histogram", self.macd_histogram),
            ("rsi", self.rsi),
            ("bollinger_lower", self.bollinger_lower),
            ("bollinger_middle", self.bollinger_middle),
            ("bollinger_upper", self.bollinger_upper),
        ];
        fields
            .iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(name, _)| (*name).to_string())
    }

    pub fn is_complete(&self, sma_windows: &[usize]) -> bool {
        self.missing_indicator(sma_windows).is_none()
    }

    /// Bollinger envelope has non-zero width (a flat series collapses it).
    pub fn bands_have_width(&self) -> bool {
        self.bollinger_upper - self.bollinger_lower > f64::EPSILON * self.bollinger_middle.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> FeatureRow {
        let mut smas = BTreeMap::new();
        smas.insert(50, 98.0);
        smas.insert(200, 95.0);
        FeatureRow {
            bar: Bar {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                open: 99.0,
                high: 101.0,
                low: 98.5,
                close: 100.0,
                volume: 10_000,
            },
            smas,
            macd: 0.4,
            macd_signal: 0.2,
            macd_histogram: 0.2,
            rsi: 55.0,
            bollinger_lower: 94.0,
            bollinger_middle: 98.0,
            bollinger_upper: 102.0,
            prediction: Some(101.0),
            secondary_prediction: None,
        }
    }

    #[test]
    fn complete_row_has_no_missing_indicator() {
        let row = sample_row();
        assert!(row.is_complete(&[50, 200]));
        assert_eq!(row.sma(50), Some(98.0));
    }

    #[test]
    fn uncomputed_window_is_missing() {
        let row = sample_row();
        assert_eq!(row.missing_indicator(&[50, 20]).as_deref(), Some("sma_20"));
    }

    #[test]
    fn nan_field_is_missing() {
        let mut row = sample_row();
        row.rsi = f64::NAN;
        assert_eq!(row.missing_indicator(&[50]).as_deref(), Some("rsi"));
        row.smas.insert(50, f64::NAN);
        assert_eq!(row.sma(50), None);
    }

    #[test]
    fn collapsed_bands_have_no_width() {
        let mut row = sample_row();
        assert!(row.bands_have_width());
        row.bollinger_lower = 98.0;
        row.bollinger_upper = 98.0;
        assert!(!row.bands_have_width());
    }
}
