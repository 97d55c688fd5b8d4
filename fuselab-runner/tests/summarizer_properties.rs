//! Property tests for the performance summarizer.
//!
//! 1. Idempotence: summarizing the same curve twice gives identical metrics
//! 2. Drawdown is within [-1, 0]
//! 3. Total return agrees with the first and last equity values
//! 4. Exit-reason counts add up to the trade count

use chrono::NaiveDate;
use fuselab_core::domain::{ExitReason, Trade};
use fuselab_runner::metrics::{max_drawdown, PerformanceMetrics};
use proptest::prelude::*;

fn arb_curve() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.05..0.05_f64, 2..300).prop_map(|returns| {
        let mut equity = 100_000.0;
        let mut curve = vec![equity];
        for r in returns {
            equity *= 1.0 + r;
            curve.push(equity);
        }
        curve
    })
}

fn arb_trades() -> impl Strategy<Value = Vec<Trade>> {
    prop::collection::vec((-500.0..500.0_f64, 0usize..4, 1usize..40), 0..25).prop_map(|specs| {
        let day = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        specs
            .into_iter()
            .map(|(pnl, reason, held)| Trade {
                entry_date: day,
                entry_price: 50.0,
                exit_date: day,
                exit_price: 50.0 + pnl / 100.0,
                shares: 100,
                pnl,
                commission: 0.0,
                net_pnl: pnl,
                bars_held: held,
                exit_reason: ExitReason::ALL[reason],
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn summary_is_idempotent(curve in arb_curve(), trades in arb_trades(), rf in 0.0..0.05_f64) {
        let a = PerformanceMetrics::compute(&curve, &trades, rf);
        let b = PerformanceMetrics::compute(&curve, &trades, rf);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn curve_metrics_are_bounded(curve in arb_curve()) {
        let m = PerformanceMetrics::compute(&curve, &[], 0.02);
        let dd = max_drawdown(&curve);
        prop_assert!((-1.0..=0.0).contains(&dd));
        prop_assert_eq!(m.max_drawdown, dd);
        let expected = curve[curve.len() - 1] / curve[0] - 1.0;
        prop_assert!((m.total_return - expected).abs() < 1e-12);
        prop_assert!(m.daily_std >= 0.0);
        prop_assert!(m.sharpe.is_finite() && m.sortino.is_finite());
        prop_assert_eq!(m.trading_days, curve.len());
    }

    #[test]
    fn trade_stats_are_consistent(trades in arb_trades()) {
        let m = PerformanceMetrics::compute(&[100.0, 101.0], &trades, 0.02);
        prop_assert_eq!(m.exit_reasons.values().sum::<usize>(), trades.len());
        prop_assert_eq!(m.exit_reasons.len(), ExitReason::ALL.len());
        prop_assert!((0.0..=1.0).contains(&m.win_rate));
        prop_assert!((0.0..=100.0).contains(&m.profit_factor));
        prop_assert!(m.max_consecutive_losses <= trades.len());
    }
}
