//! Moving Average Convergence Divergence (MACD).
//!
//! Three series (separate Indicator instances):
//! - Line: EMA(fast) - EMA(slow)
//! - Signal: EMA(signal) of the line
//! - Histogram: line - signal
//!
//! Lookback: slow - 1 for the line, slow + signal - 2 for signal/histogram.

use super::ema::ema_series;
use super::Indicator;

/// Which MACD series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdSeries {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    series: MacdSeries,
    name: String,
}

impl Macd {
    pub fn new(series: MacdSeries, fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1, "MACD fast period must be >= 1");
        assert!(slow > fast, "MACD slow period must be > fast period");
        assert!(signal >= 1, "MACD signal period must be >= 1");
        let label = match series {
            MacdSeries::Line => "line",
            MacdSeries::Signal => "signal",
            MacdSeries::Histogram => "histogram",
        };
        Self {
            fast,
            slow,
            signal,
            series,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }

    /// Standard 12/26/9 parameters.
    pub fn standard(series: MacdSeries) -> Self {
        Self::new(series, 12, 26, 9)
    }

    fn line(&self, closes: &[f64]) -> Vec<f64> {
        let fast = ema_series(closes, self.fast);
        let slow = ema_series(closes, self.slow);
        fast.iter().zip(&slow).map(|(f, s)| f - s).collect()
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.series {
            MacdSeries::Line => self.slow - 1,
            MacdSeries::Signal | MacdSeries::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let line = self.line(closes);
        if self.series == MacdSeries::Line {
            return line;
        }
        let signal = ema_series(&line, self.signal);
        match self.series {
            MacdSeries::Signal => signal,
            _ => line.iter().zip(&signal).map(|(l, s)| l - s).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, closes_from, DEFAULT_EPSILON};

    #[test]
    fn warmup_matches_lookback() {
        let closes = closes_from(60, |i| 100.0 + i as f64);
        for series in [MacdSeries::Line, MacdSeries::Signal, MacdSeries::Histogram] {
            let macd = Macd::standard(series);
            let result = macd.compute(&closes);
            let lookback = macd.lookback();
            assert!(result[..lookback].iter().all(|v| v.is_nan()), "{}", macd.name());
            assert!(!result[lookback].is_nan(), "{}", macd.name());
        }
    }

    #[test]
    fn constant_price_is_zero() {
        let closes = vec![50.0; 60];
        let line = Macd::standard(MacdSeries::Line).compute(&closes);
        let hist = Macd::standard(MacdSeries::Histogram).compute(&closes);
        assert_approx(line[59], 0.0, DEFAULT_EPSILON);
        assert_approx(hist[59], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rising_series_has_positive_line() {
        let closes = closes_from(60, |i| 100.0 + 2.0 * i as f64);
        let line = Macd::standard(MacdSeries::Line).compute(&closes);
        assert!(line[59] > 0.0);
    }

    #[test]
    fn histogram_is_line_minus_signal() {
        let closes = closes_from(80, |i| 100.0 + (i as f64 * 0.3).sin() * 5.0);
        let line = Macd::standard(MacdSeries::Line).compute(&closes);
        let signal = Macd::standard(MacdSeries::Signal).compute(&closes);
        let hist = Macd::standard(MacdSeries::Histogram).compute(&closes);
        for i in 33..80 {
            assert_approx(hist[i], line[i] - signal[i], DEFAULT_EPSILON);
        }
    }
}
