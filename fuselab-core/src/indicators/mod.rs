//! Indicator library: pure functions from a close series to a numeric series.
//!
//! The decision engine never recomputes indicators; the feature builder runs
//! every indicator once over the full bar history and stores the values in
//! `FeatureRow`s. Multi-series indicators (Bollinger, MACD) are exposed as
//! separate named instances per band/line, keeping the single-series
//! `Indicator` trait unchanged.
//!
//! # Look-ahead contamination guard
//! No value at index t may depend on closes at t+1 or later. Every indicator
//! must produce identical prefixes for a truncated and a full series.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::{Bollinger, BollingerBand};
pub use ema::Ema;
pub use macd::{Macd, MacdSeries};
pub use rsi::Rsi;
pub use sma::Sma;

/// Trait for indicators.
///
/// Output has the same length as the input. The first `lookback()` values are
/// `f64::NAN` (warm-up); a NaN close poisons every window that contains it.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_50", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading values that are NaN on a clean series.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire close series.
    fn compute(&self, closes: &[f64]) -> Vec<f64>;
}

/// Create a close series of `n` values following `f(i)`.
#[cfg(test)]
pub fn closes_from(n: usize, f: impl Fn(usize) -> f64) -> Vec<f64> {
    (0..n).map(f).collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
