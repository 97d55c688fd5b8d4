//! Simple Moving Average (SMA).
//!
//! Rolling mean of closes over a fixed window.
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let mut result = vec![f64::NAN; closes.len()];

        // Rolling sum over finite values plus a count of NaNs in the window;
        // any NaN inside the window yields NaN.
        let mut sum = 0.0;
        let mut nan_count = 0usize;
        for (i, &close) in closes.iter().enumerate() {
            if close.is_nan() {
                nan_count += 1;
            } else {
                sum += close;
            }

            if i >= self.period {
                let leaving = closes[i - self.period];
                if leaving.is_nan() {
                    nan_count -= 1;
                } else {
                    sum -= leaving;
                }
            }

            if i + 1 >= self.period && nan_count == 0 {
                result[i] = sum / self.period as f64;
            }
        }

        result
    }
}
