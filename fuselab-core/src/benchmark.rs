//! Buy-and-hold benchmark curve.
//!
//! Invests the whole capital (whole shares only) at the first tradable close
//! and holds to the end. Days with a bad close are marked at the last valid
//! close, the same way the simulation loop carries equity forward.

use crate::domain::{Bar, PortfolioSnapshot};

/// One snapshot per bar.
pub fn buy_and_hold(bars: &[Bar], capital: f64) -> Vec<PortfolioSnapshot> {
    let mut snapshots = Vec::with_capacity(bars.len());
    let mut cash = capital;
    let mut shares = 0u64;
    let mut last_close: Option<f64> = None;

    for bar in bars {
        if bar.has_tradable_close() {
            if last_close.is_none() {
                shares = (capital / bar.close).floor().max(0.0) as u64;
                cash = capital - shares as f64 * bar.close;
            }
            last_close = Some(bar.close);
        }
        let mark = last_close.unwrap_or(0.0);
        snapshots.push(PortfolioSnapshot::new(bar.date, cash, shares as f64 * mark, mark));
    }

    snapshots
}
