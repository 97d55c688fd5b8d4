//! Feature frame construction.
//!
//! All indicators are computed once over the tradable bars, then zipped with
//! the forecaster outputs into one `FeatureRow` per bar. A bar without a
//! tradable close is left out of every indicator window (its row carries NaN
//! indicators), so the series resume on the next good bar. Forecasts are joined
//! by date; a date with no forecast yields `None` rather than a fabricated value.

use crate::domain::{Bar, FeatureRow};
use crate::indicators::{Bollinger, Indicator, Macd, MacdSeries, Rsi, Sma};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Forecaster output keyed by the date the forecast was made on.
pub type Predictions = BTreeMap<NaiveDate, f64>;

/// SMA windows every feature frame carries, whatever the profiles ask for.
pub const BASE_SMA_WINDOWS: [usize; 2] = [50, 200];

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("insufficient data: {required} bars required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("bars out of order at index {index}: {date} does not follow {previous}")]
    Unordered {
        index: usize,
        previous: NaiveDate,
        date: NaiveDate,
    },
}

/// Indicator parameters for the feature builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub sma_windows: Vec<usize>,
    pub rsi_period: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sma_windows: vec![20, 50, 200],
            rsi_period: 14,
            bollinger_period: 20,
            bollinger_k: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl FeatureConfig {
    /// Default parameters with the given extra SMA windows (trailing-stop
    /// windows of the profiles being run).
    pub fn with_sma_windows(extra: impl IntoIterator<Item = usize>) -> Self {
        let mut config = Self::default();
        config.sma_windows = config
            .sma_windows
            .into_iter()
            .chain(extra)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        config
    }

    /// Configured windows plus the base 50/200, sorted and deduplicated.
    pub fn resolved_sma_windows(&self) -> Vec<usize> {
        self.sma_windows
            .iter()
            .copied()
            .chain(BASE_SMA_WINDOWS)
            .filter(|&w| w > 0)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        let mut indicators: Vec<Box<dyn Indicator>> = Vec::new();
        for window in self.resolved_sma_windows() {
            indicators.push(Box::new(Sma::new(window)));
        }
        for series in [MacdSeries::Line, MacdSeries::Signal, MacdSeries::Histogram] {
            indicators.push(Box::new(Macd::new(
                series,
                self.macd_fast,
                self.macd_slow,
                self.macd_signal,
            )));
        }
        indicators.push(Box::new(Rsi::new(self.rsi_period)));
        indicators.push(Box::new(Bollinger::lower(self.bollinger_period, self.bollinger_k)));
        indicators.push(Box::new(Bollinger::middle(self.bollinger_period, self.bollinger_k)));
        indicators.push(Box::new(Bollinger::upper(self.bollinger_period, self.bollinger_k)));
        indicators
    }

    /// Leading bars with at least one undefined indicator on a clean series.
    pub fn warmup(&self) -> usize {
        self.indicators()
            .iter()
            .map(|i| i.lookback())
            .max()
            .unwrap_or(0)
    }

    /// Minimum number of bars that yields one complete feature row.
    pub fn required_bars(&self) -> usize {
        self.warmup() + 1
    }
}

/// Build one feature row per bar.
///
/// Rows inside the warm-up window are returned too (with NaN indicator
/// fields); the simulation loop excludes them. `InsufficientData` counts only
/// bars with a tradable close.
pub fn build_features(
    bars: &[Bar],
    primary: Option<&Predictions>,
    secondary: Option<&Predictions>,
    config: &FeatureConfig,
) -> Result<Vec<FeatureRow>, FeatureError> {
    for (index, pair) in bars.windows(2).enumerate() {
        if pair[1].date <= pair[0].date {
            return Err(FeatureError::Unordered {
                index: index + 1,
                previous: pair[0].date,
                date: pair[1].date,
            });
        }
    }

    // Position of each bar in the tradable-close series, if it has one.
    let mut slots = Vec::with_capacity(bars.len());
    let mut closes = Vec::with_capacity(bars.len());
    for bar in bars {
        if bar.has_tradable_close() {
            slots.push(Some(closes.len()));
            closes.push(bar.close);
        } else {
            slots.push(None);
        }
    }

    let required = config.required_bars();
    if closes.len() < required {
        return Err(FeatureError::InsufficientData {
            required,
            available: closes.len(),
        });
    }

    let windows = config.resolved_sma_windows();
    let sma_series: Vec<(usize, Vec<f64>)> = windows
        .iter()
        .map(|&w| (w, Sma::new(w).compute(&closes)))
        .collect();
    let macd = |series| {
        Macd::new(series, config.macd_fast, config.macd_slow, config.macd_signal).compute(&closes)
    };
    let macd_line = macd(MacdSeries::Line);
    let macd_signal = macd(MacdSeries::Signal);
    let macd_hist = macd(MacdSeries::Histogram);
    let rsi = Rsi::new(config.rsi_period).compute(&closes);
    let (period, k) = (config.bollinger_period, config.bollinger_k);
    let bb_lower = Bollinger::lower(period, k).compute(&closes);
    let bb_middle = Bollinger::middle(period, k).compute(&closes);
    let bb_upper = Bollinger::upper(period, k).compute(&closes);

    let rows = bars
        .iter()
        .zip(&slots)
        .map(|(bar, slot)| {
            let at = |series: &[f64]| slot.map_or(f64::NAN, |j| series[j]);
            FeatureRow {
                bar: bar.clone(),
                smas: sma_series.iter().map(|(w, s)| (*w, at(s))).collect(),
                macd: at(&macd_line),
                macd_signal: at(&macd_signal),
                macd_histogram: at(&macd_hist),
                rsi: at(&rsi),
                bollinger_lower: at(&bb_lower),
                bollinger_middle: at(&bb_middle),
                bollinger_upper: at(&bb_upper),
                prediction: primary.and_then(|p| p.get(&bar.date).copied()),
                secondary_prediction: secondary.and_then(|p| p.get(&bar.date).copied()),
            }
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000,
            })
            .collect()
    }

    fn small_config() -> FeatureConfig {
        FeatureConfig {
            sma_windows: vec![3],
            rsi_period: 3,
            bollinger_period: 3,
            bollinger_k: 2.0,
            macd_fast: 2,
            macd_slow: 3,
            macd_signal: 2,
        }
    }

    #[test]
    fn default_config_warmup_is_sma_200() {
        let config = FeatureConfig::default();
        assert_eq!(config.warmup(), 199);
        assert_eq!(config.required_bars(), 200);
    }

    #[test]
    fn base_windows_always_present() {
        let config = FeatureConfig {
            sma_windows: vec![30],
            ..FeatureConfig::default()
        };
        assert_eq!(config.resolved_sma_windows(), vec![30, 50, 200]);
        assert_eq!(
            FeatureConfig::with_sma_windows([50, 10]).resolved_sma_windows(),
            vec![10, 20, 50, 200]
        );
    }

    #[test]
    fn too_few_bars_is_insufficient_data() {
        let bars = make_bars(&[100.0; 150]);
        let err = build_features(&bars, None, None, &FeatureConfig::default()).unwrap_err();
        assert_eq!(
            err,
            FeatureError::InsufficientData {
                required: 200,
                available: 150
            }
        );
    }

    #[test]
    fn unordered_bars_rejected() {
        let mut bars = make_bars(&[100.0; 210]);
        bars.swap(100, 101);
        let err = build_features(&bars, None, None, &FeatureConfig::default()).unwrap_err();
        assert!(matches!(err, FeatureError::Unordered { index: 101, .. }));
    }

    #[test]
    fn rows_align_with_bars_and_predictions() {
        let closes: Vec<f64> = (0..260).map(|i| 100.0 + (i as f64 * 0.2).sin()).collect();
        let bars = make_bars(&closes);
        let mut preds = Predictions::new();
        preds.insert(bars[250].date, 101.5);

        let rows = build_features(&bars, Some(&preds), None, &FeatureConfig::default()).unwrap();
        assert_eq!(rows.len(), bars.len());
        assert!(!rows[198].is_complete(&[50, 200]));
        assert!(rows[199].is_complete(&[50, 200]));
        assert_eq!(rows[250].prediction, Some(101.5));
        assert_eq!(rows[251].prediction, None);
        assert_eq!(rows[250].secondary_prediction, None);
    }

    #[test]
    fn bad_close_is_left_out_of_indicator_windows() {
        let mut closes: Vec<f64> = (0..260).map(|i| 100.0 + (i as f64 * 0.2).sin()).collect();
        closes[230] = f64::NAN;
        let rows = build_features(&make_bars(&closes), None, None, &FeatureConfig::default()).unwrap();

        assert!(rows[230].rsi.is_nan());
        assert!(rows[230].macd.is_nan());
        for r in &rows[231..] {
            assert!(r.is_complete(&[50, 200]), "incomplete row on {}", r.date());
        }

        // Indicators after the gap see the series with the bad bar removed.
        let tradable: Vec<f64> = closes.iter().copied().filter(|c| c.is_finite()).collect();
        let rsi = Rsi::new(14).compute(&tradable);
        assert_eq!(rows[231].rsi, rsi[230]);
        assert_eq!(rows[259].sma(50), Some(Sma::new(50).compute(&tradable)[258]));
    }

    #[test]
    fn insufficient_data_counts_tradable_bars() {
        let mut closes = vec![100.0; 200];
        closes[10] = 0.0;
        let err = build_features(&make_bars(&closes), None, None, &FeatureConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            FeatureError::InsufficientData {
                required: 200,
                available: 199
            }
        );
    }

    #[test]
    fn indicator_values_match_library() {
        let closes = [10.0, 11.0, 12.0, 11.0, 13.0, 14.0, 12.0, 15.0];
        let bars = make_bars(&closes);
        let config = FeatureConfig {
            sma_windows: vec![3],
            ..small_config()
        };
        // Base windows 50/200 exceed the series; build on a longer one instead.
        assert!(build_features(&bars, None, None, &config).is_err());

        let long: Vec<f64> = (0..220).map(|i| 50.0 + (i % 7) as f64).collect();
        let rows = build_features(&make_bars(&long), None, None, &config).unwrap();
        let sma3 = Sma::new(3).compute(&long);
        let rsi = Rsi::new(3).compute(&long);
        for i in 200..220 {
            assert_eq!(rows[i].sma(3), Some(sma3[i]));
            assert_eq!(rows[i].rsi, rsi[i]);
        }
    }
}
