//! Property tests for indicator, sizing, circuit-breaker and backtest invariants.

mod common;

use chrono::Duration;
use common::{day, Bar};
use cryptotrader::domain::backtest::{run_backtest, BacktestConfig};
use cryptotrader::domain::indicator::calculate_rsi;
use cryptotrader::domain::indicator_helpers::compute_indicator_sets;
use cryptotrader::domain::position::TradeKind;
use cryptotrader::domain::risk::{RiskConfig, RiskManager, TradeStats};
use cryptotrader::domain::safety::{SafetyConfig, SafetyManager};
use cryptotrader::domain::signal::generate_signal;
use cryptotrader::domain::strategy::StrategyParams;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Multiplicative random walk starting at 100.
fn arb_walk(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.04..0.04_f64, min_len..max_len).prop_map(|steps| {
        let mut price = 100.0;
        steps
            .into_iter()
            .map(|r| {
                price *= 1.0 + r;
                price
            })
            .collect()
    })
}

fn walk_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: day(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000.0,
        })
        .collect()
}

// ── Indicators ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_stays_within_bounds(closes in arb_walk(20, 120), period in 2usize..20) {
        let bars = walk_bars(&closes);
        let rsi = calculate_rsi(&bars, period);
        for i in 0..bars.len() {
            if let Some(v) = rsi.simple_at(i) {
                prop_assert!((0.0..=100.0).contains(&v), "rsi {} at {}", v, i);
            }
        }
    }

    #[test]
    fn no_signal_during_warmup(closes in arb_walk(60, 120)) {
        let params = StrategyParams::default();
        let bars = walk_bars(&closes);
        let sets = compute_indicator_sets(&bars, &params).unwrap();
        for i in 0..params.warmup_bars().min(bars.len()) {
            let signal = generate_signal(&bars[i], &sets[i], &params);
            prop_assert!(!signal.buy && !signal.sell, "signal during warm-up at {}", i);
        }
    }
}

// ── Sizing ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn kelly_is_bounded(win_rate in 0.0..=1.0_f64, ratio in 0.01..100.0_f64) {
        let manager = RiskManager::new(RiskConfig::default());
        let k = manager.kelly_fraction(win_rate, ratio).unwrap();
        prop_assert!(k >= 0.0);
        prop_assert!(k <= manager.config().kelly_fraction);
    }

    #[test]
    fn kelly_is_zero_without_wins(ratio in 0.01..100.0_f64) {
        let manager = RiskManager::new(RiskConfig::default());
        prop_assert_eq!(manager.kelly_fraction(0.0, ratio).unwrap(), 0.0);
    }

    #[test]
    fn size_is_zero_when_stop_not_below_entry(
        capital in 1.0..1e6_f64,
        entry in 1.0..1e4_f64,
        above in 0.0..100.0_f64,
    ) {
        let manager = RiskManager::new(RiskConfig::default());
        let size = manager.position_size(capital, entry, entry + above, None).unwrap();
        prop_assert_eq!(size, 0.0);
    }

    #[test]
    fn loss_at_stop_never_exceeds_risk_budget(
        capital in 100.0..1e6_f64,
        entry in 1.0..1e4_f64,
        stop_frac in 0.01..0.99_f64,
        win_rate in 0.0..=1.0_f64,
        ratio in 0.1..10.0_f64,
        use_kelly in any::<bool>(),
    ) {
        let manager = RiskManager::new(RiskConfig::default());
        let stop = entry * stop_frac;
        let stats = TradeStats { win_rate, win_loss_ratio: ratio };
        let budget = if use_kelly {
            manager.kelly_fraction(win_rate, ratio).unwrap()
        } else {
            manager.config().fixed_risk_fraction
        };

        let size = manager
            .position_size(capital, entry, stop, use_kelly.then_some(&stats))
            .unwrap();
        prop_assert!(size >= 0.0);
        prop_assert!(size * (entry - stop) <= capital * budget * (1.0 + 1e-9));
    }
}

// ── Circuit breaker ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn rising_equity_never_trips(steps in prop::collection::vec(0.0..50.0_f64, 1..200)) {
        let mut manager = SafetyManager::new(SafetyConfig::default());
        let mut equity = 10_000.0;
        for (i, step) in steps.iter().enumerate() {
            equity += step;
            let ts = day(0) + Duration::hours(i as i64);
            prop_assert!(manager.check_risk(equity, ts));
        }
        prop_assert!(!manager.is_halted());
    }

    #[test]
    fn drawdown_trips_on_first_crossing(step in 10.0..500.0_f64) {
        let config = SafetyConfig::default();
        let mut manager = SafetyManager::new(config.clone());
        let peak = 10_000.0;
        prop_assert!(manager.check_risk(peak, day(0)));

        let mut k = 1i64;
        loop {
            let value = peak - k as f64 * step;
            let crossed = (peak - value) / peak > config.max_drawdown;
            let allowed = manager.check_risk(value, day(k));
            prop_assert_eq!(allowed, !crossed, "step {} at k {}", step, k);
            if crossed {
                break;
            }
            k += 1;
        }
        prop_assert!(manager.is_halted());
    }
}

// ── Backtest ─────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ledger_alternates_and_equity_stays_positive(closes in arb_walk(60, 160)) {
        let bars = walk_bars(&closes);
        let result = run_backtest(&bars, &BacktestConfig::default()).unwrap();

        prop_assert_eq!(result.equity_curve.len(), bars.len());
        for point in &result.equity_curve {
            prop_assert!(point.equity.is_finite() && point.equity > 0.0);
        }
        for (i, trade) in result.ledger.iter().enumerate() {
            let expect_buy = i % 2 == 0;
            prop_assert_eq!(trade.kind == TradeKind::Buy, expect_buy);
        }
        // any position still open is closed at the end
        prop_assert_eq!(result.ledger.len() % 2, 0);
    }
}
