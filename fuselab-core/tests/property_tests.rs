//! Property tests for engine invariants.
//!
//! Uses proptest to verify, over random price paths and forecasts:
//! 1. Accounting identity: cash + position_value == total_equity every day
//! 2. Cash never goes negative
//! 3. Single position: trades never overlap and never re-enter on an exit day
//! 4. Sizing: no entry spends more than position_size_pct of the capital base
//! 5. Continuity: exactly one snapshot per simulated day
//! 6. Determinism: replay yields identical output
//!
//! 1, 2 and 4 are also checked under random slippage and commission.

use chrono::NaiveDate;
use proptest::prelude::*;
use fuselab_core::domain::{Bar, ExitReason};
use fuselab_core::engine::CostModel;
use fuselab_core::{
    build_features, simulate, FeatureConfig, Predictions, SimulationConfig, StrategyProfile,
};

const CAPITAL: f64 = 50_000.0;
const BARS: usize = 320;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_returns() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.04..0.04_f64, BARS)
}

fn arb_forecast_noise() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.9, -0.03..0.03_f64), BARS)
}

fn arb_profile() -> impl Strategy<Value = StrategyProfile> {
    prop_oneof![
        Just(StrategyProfile::conservative()),
        Just(StrategyProfile::aggressive()),
        (1usize..=4, 0.01..1.0_f64, 0.01..0.2_f64, 5usize..60).prop_map(
            |(min_aligned, size, stop, window)| {
                let mut p = StrategyProfile::aggressive();
                p.name = "random".into();
                p.min_aligned_signals = min_aligned;
                p.position_size_pct = size;
                p.stop_loss_pct = stop;
                p.trailing_stop_window = window;
                p
            }
        ),
    ]
}

fn arb_costs() -> impl Strategy<Value = CostModel> {
    (0.0..50.0_f64, 0.0..20.0_f64).prop_map(|(bps, commission)| CostModel::new(bps, commission))
}

// ── Helpers ──────────────────────────────────────────────────────────

fn build_inputs(returns: &[f64], noise: &[Option<f64>], trailing: usize) -> Vec<fuselab_core::domain::FeatureRow> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let mut price = 100.0;
    let mut bars = Vec::with_capacity(returns.len());
    for (i, r) in returns.iter().enumerate() {
        price *= 1.0 + r;
        bars.push(Bar {
            date: start + chrono::Duration::days(i as i64),
            open: price,
            high: price * 1.01,
            low: price * 0.99,
            close: price,
            volume: 1_000,
        });
    }
    let forecast: Predictions = bars
        .iter()
        .zip(noise)
        .filter_map(|(b, n)| n.map(|n| (b.date, b.close * (1.0 + n))))
        .collect();
    let config = FeatureConfig::with_sma_windows([trailing]);
    build_features(&bars, Some(&forecast), None, &config).unwrap()
}

// ── Invariants ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn ledger_invariants_hold(
        returns in arb_returns(),
        noise in arb_forecast_noise(),
        profile in arb_profile(),
    ) {
        let rows = build_inputs(&returns, &noise, profile.trailing_stop_window);
        let result = simulate(&rows, &profile, &SimulationConfig::new(CAPITAL)).unwrap();

        // 5. one snapshot per simulated day
        prop_assert_eq!(result.snapshots.len(), rows.len() - result.warmup_rows);

        for snap in &result.snapshots {
            // 1. accounting identity
            prop_assert!((snap.cash + snap.position_value - snap.total_equity).abs() < 1e-6);
            // 2. cash never negative
            prop_assert!(snap.cash >= -1e-9, "negative cash {} on {}", snap.cash, snap.date);
            prop_assert!(snap.position_value >= 0.0);
        }

        // 3. trades are sequential and never re-enter on the exit day
        for pair in result.trades.windows(2) {
            prop_assert!(pair[0].exit_date < pair[1].entry_date);
        }
        if let (Some(last), Some(open)) = (result.trades.last(), result.final_position.entry_date) {
            prop_assert!(last.exit_date < open);
        }

        // 4. entries respect the size cap
        let cap = profile.position_size_pct * CAPITAL + 1e-6;
        for trade in &result.trades {
            prop_assert!(trade.shares > 0);
            prop_assert!(trade.shares as f64 * trade.entry_price <= cap);
            prop_assert!(trade.entry_date <= trade.exit_date);
            prop_assert!(ExitReason::ALL.contains(&trade.exit_reason));
        }

        // Flat ⇔ zero shares
        prop_assert!(result.final_position.is_consistent());
        if result.final_position.is_flat() {
            prop_assert_eq!(result.final_position.shares_held, 0);
        }
    }

    #[test]
    fn ledger_invariants_hold_with_costs(
        returns in arb_returns(),
        noise in arb_forecast_noise(),
        profile in arb_profile(),
        costs in arb_costs(),
    ) {
        let rows = build_inputs(&returns, &noise, profile.trailing_stop_window);
        let mut config = SimulationConfig::new(CAPITAL);
        config.costs = costs;
        let result = simulate(&rows, &profile, &config).unwrap();

        for snap in &result.snapshots {
            prop_assert!((snap.cash + snap.position_value - snap.total_equity).abs() < 1e-6);
            prop_assert!(snap.cash >= 0.0, "negative cash {} on {}", snap.cash, snap.date);
        }

        // Entry fill plus entry commission stays within the sizing budget.
        let budget = profile.position_size_pct * CAPITAL + 1e-6;
        let entry_commission = costs.commission_per_trade;
        for trade in &result.trades {
            prop_assert!(trade.shares as f64 * trade.entry_price + entry_commission <= budget);
            prop_assert!((trade.commission - 2.0 * entry_commission).abs() < 1e-9);
        }
        let open = &result.final_position;
        if let Some(entry_price) = open.entry_price {
            prop_assert!(open.shares_held as f64 * entry_price + entry_commission <= budget);
        }
    }

    #[test]
    fn stop_loss_exits_never_beat_the_stop(
        returns in arb_returns(),
        noise in arb_forecast_noise(),
        profile in arb_profile(),
    ) {
        let rows = build_inputs(&returns, &noise, profile.trailing_stop_window);
        let result = simulate(&rows, &profile, &SimulationConfig::new(CAPITAL)).unwrap();
        for trade in result.trades.iter().filter(|t| t.exit_reason == ExitReason::StopLoss) {
            prop_assert!(trade.exit_price <= trade.entry_price * (1.0 - profile.stop_loss_pct) + 1e-9);
        }
    }

    #[test]
    fn simulation_is_deterministic(
        returns in arb_returns(),
        noise in arb_forecast_noise(),
    ) {
        let profile = StrategyProfile::aggressive();
        let rows = build_inputs(&returns, &noise, profile.trailing_stop_window);
        let a = simulate(&rows, &profile, &SimulationConfig::new(CAPITAL)).unwrap();
        let b = simulate(&rows, &profile, &SimulationConfig::new(CAPITAL)).unwrap();
        prop_assert_eq!(a, b);
    }
}
