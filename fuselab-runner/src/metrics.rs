//! Performance summarizer: pure functions over an equity curve and trade log.
//!
//! Every metric is a pure function: equity curve and/or trades in, scalar out.
//! Computing the summary twice on the same inputs yields identical values.

use fuselab_core::domain::{ExitReason, Trade};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trading days per year used for every annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annual risk-free rate used when none is configured.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Summary statistics for one simulated equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // ── Curve ──
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    /// Negative fraction of the running peak (e.g. -0.15 = 15% drawdown).
    pub max_drawdown: f64,
    pub daily_std: f64,
    pub annualized_volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub risk_free_rate: f64,
    pub trading_days: usize,

    // ── Trades ──
    pub trade_count: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_trade_return: f64,
    pub avg_bars_held: f64,
    pub max_consecutive_losses: usize,
    /// Trade count per exit reason, every reason present (zero if unused).
    pub exit_reasons: BTreeMap<ExitReason, usize>,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    pub fn compute(equity_curve: &[f64], trades: &[Trade], risk_free_rate: f64) -> Self {
        let returns = daily_returns(equity_curve);
        let daily_std = std_dev(&returns);
        Self {
            initial_equity: equity_curve.first().copied().unwrap_or(0.0),
            final_equity: equity_curve.last().copied().unwrap_or(0.0),
            total_return: total_return(equity_curve),
            annualized_return: annualized_return(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            daily_std,
            annualized_volatility: daily_std * TRADING_DAYS_PER_YEAR.sqrt(),
            sharpe: sharpe_ratio(equity_curve, risk_free_rate),
            sortino: sortino_ratio(equity_curve, risk_free_rate),
            risk_free_rate,
            trading_days: equity_curve.len(),
            trade_count: trades.len(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            avg_trade_return: avg_trade_return(trades),
            avg_bars_held: avg_bars_held(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            exit_reasons: exit_reason_counts(trades),
        }
    }
}

// ─── Curve metrics ──────────────────────────────────────────────────

/// Total return as a fraction: final / initial - 1.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&final_eq)) if equity_curve.len() >= 2 && initial > 0.0 => {
            final_eq / initial - 1.0
        }
        _ => 0.0,
    }
}

/// Compound annual return over the elapsed trading days (curve length - 1).
///
/// Returns 0.0 for a single-point curve or a non-positive endpoint.
pub fn annualized_return(equity_curve: &[f64]) -> f64 {
    let periods = equity_curve.len().saturating_sub(1);
    if periods == 0 {
        return 0.0;
    }
    let (initial, final_eq) = (equity_curve[0], equity_curve[periods]);
    if initial <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    (final_eq / initial).powf(TRADING_DAYS_PER_YEAR / periods as f64) - 1.0
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = (mean daily return - rf/252) / std(daily returns) * sqrt(252).
/// Returns 0.0 if the deviation is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    let excess = mean_f64(&returns) - risk_free_rate / TRADING_DAYS_PER_YEAR;
    excess / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside or fewer than 2 returns.
pub fn sortino_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let downside_sq: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / downside_std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum drawdown as a negative fraction of the running peak.
///
/// Returns 0.0 if equity never falls below a prior peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

// ─── Trade metrics ──────────────────────────────────────────────────

/// Fraction of trades with positive net PnL.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Gross profits / gross losses, capped at 100.0 when nothing was lost.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().map(|t| t.net_pnl.max(0.0)).sum();
    let gross_loss: f64 = trades.iter().map(|t| (-t.net_pnl).max(0.0)).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Mean per-trade return on entry cost.
pub fn avg_trade_return(trades: &[Trade]) -> f64 {
    let returns: Vec<f64> = trades.iter().map(|t| t.return_pct()).collect();
    mean_f64(&returns)
}

pub fn avg_bars_held(trades: &[Trade]) -> f64 {
    let bars: Vec<f64> = trades.iter().map(|t| t.bars_held as f64).collect();
    mean_f64(&bars)
}

/// Longest run of consecutive non-winning trades.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() {
            current = 0;
        } else {
            current += 1;
            max_streak = max_streak.max(current);
        }
    }
    max_streak
}

pub fn exit_reason_counts(trades: &[Trade]) -> BTreeMap<ExitReason, usize> {
    let mut counts: BTreeMap<ExitReason, usize> =
        ExitReason::ALL.iter().map(|&r| (r, 0)).collect();
    for trade in trades {
        *counts.entry(trade.exit_reason).or_default() += 1;
    }
    counts
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple daily returns from an equity curve.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
