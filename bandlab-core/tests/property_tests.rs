//! Property tests for indicator and automaton invariants.
//!
//! Uses proptest to verify:
//! 1. RSI length and range
//! 2. RSI limits on monotonic series
//! 3. Bollinger band ordering
//! 4. Stop-loss ratchet monotonicity
//! 5. Wallet conservation: each fill loses exactly its fee
//! 6. Backtest determinism

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use bandlab_core::automaton::{Sizing, StopLoss, StrategyAutomaton, Wallet};
use bandlab_core::domain::{Bar, ParameterSet, PriceSeries};
use bandlab_core::engine::{precompute_frame, run_backtest, EngineConfig};
use bandlab_core::indicators::{bollinger_bands, rsi};
use bandlab_core::signal::BarSnapshot;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_prices(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(10.0..500.0_f64, 0..max_len)
}

/// Random walk of (high, low) pairs that stays positive.
fn arb_ranges() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-0.04..0.04_f64, 0.0..0.03_f64), 20..120).prop_map(|steps| {
        let mut mid = 100.0;
        steps
            .into_iter()
            .map(|(ret, spread)| {
                mid *= 1.0 + ret;
                (mid * (1.0 + spread), mid * (1.0 - spread))
            })
            .collect()
    })
}

fn arb_params() -> impl Strategy<Value = ParameterSet> {
    (
        2usize..8,
        0usize..6,
        60.0..90.0_f64,
        10.0..40.0_f64,
        0.5..3.0_f64,
        0.1..1.0_f64,
        0.0..0.05_f64,
    )
        .prop_map(|(rsi_period, extra, upper, lower, level, portion, slp)| ParameterSet {
            rsi_period,
            rsi_upper_bound: upper,
            rsi_lower_bound: lower,
            bb_period: rsi_period + extra,
            bb_level: level,
            portion,
            stop_loss_portion: slp,
            stop_loss_enabled: true,
        })
}

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn to_series(ranges: &[(f64, f64)]) -> PriceSeries {
    let bars = ranges
        .iter()
        .enumerate()
        .map(|(i, &(high, low))| Bar {
            timestamp: t0() + Duration::minutes(15 * i as i64),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: None,
        })
        .collect();
    PriceSeries::new("PROP", bars).unwrap()
}

// ── 1-2. RSI ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_length_matches_warmup(prices in arb_prices(60), period in 2usize..15) {
        let out = rsi(&prices, period);
        let expected = if prices.len() > period { prices.len() - (period - 1) } else { 0 };
        prop_assert_eq!(out.len(), expected);
    }

    #[test]
    fn rsi_stays_in_range(prices in arb_prices(80), period in 2usize..15) {
        for v in rsi(&prices, period) {
            prop_assert!((0.0..=100.0).contains(&v), "rsi {} out of range", v);
        }
    }

    #[test]
    fn rsi_saturates_on_monotonic_series(
        start in 10.0..100.0_f64,
        steps in prop::collection::vec(0.01..5.0_f64, 5..50),
        period in 2usize..5,
    ) {
        let rising: Vec<f64> = steps
            .iter()
            .scan(start, |p, s| { *p += s; Some(*p) })
            .collect();
        for v in rsi(&rising, period) {
            prop_assert_eq!(v, 100.0);
        }

        let falling: Vec<f64> = steps
            .iter()
            .scan(start + 500.0, |p, s| { *p -= s; Some(*p) })
            .collect();
        for v in rsi(&falling, period) {
            prop_assert!(v.abs() < 1e-9, "rsi {} on falling series", v);
        }
    }
}

// ── 3. Bollinger ordering ────────────────────────────────────────────

proptest! {
    #[test]
    fn bands_are_ordered(prices in arb_prices(80), period in 1usize..20, level in 0.0..4.0_f64) {
        let bands = bollinger_bands(&prices, period, level);
        for i in 0..bands.len() {
            prop_assert!(bands.upper[i] >= bands.middle[i]);
            prop_assert!(bands.middle[i] >= bands.lower[i]);
        }
    }
}

// ── 4. Ratchet monotonicity ──────────────────────────────────────────

proptest! {
    /// Between fills, an armed floor never decreases and an armed ceiling never increases.
    #[test]
    fn stop_loss_only_tightens(ranges in arb_ranges(), slp in 0.001..0.1_f64) {
        let series = to_series(&ranges);
        let params = ParameterSet { rsi_period: 3, bb_period: 4, ..ParameterSet::default() };
        let frame = precompute_frame(&series, &params).unwrap();
        let bars = frame.snapshots();

        let mut floor = StopLoss::Inactive.after_buy(&bars[0], slp);
        let mut ceiling = StopLoss::Inactive.after_sell(&bars[0], slp);
        for bar in &bars[1..] {
            let next_floor = floor.ratchet(bar, slp);
            let next_ceiling = ceiling.ratchet(bar, slp);
            prop_assert!(next_floor.lower().unwrap() >= floor.lower().unwrap());
            prop_assert!(next_ceiling.upper().unwrap() <= ceiling.upper().unwrap());
            floor = next_floor;
            ceiling = next_ceiling;
        }
    }
}

// ── 5. Wallet conservation ───────────────────────────────────────────

fn value(wallet: &Wallet, bar: &BarSnapshot) -> f64 {
    wallet.value_at(bar.price)
}

proptest! {
    #[test]
    fn fills_lose_exactly_their_fee(
        ranges in arb_ranges(),
        params in arb_params(),
        graduated in any::<bool>(),
    ) {
        let series = to_series(&ranges);
        let Ok(frame) = precompute_frame(&series, &params) else {
            return Ok(());
        };
        let sizing = if graduated { Sizing::Graduated } else { Sizing::Fixed };
        let first = frame.snapshots()[0];
        let mut automaton =
            StrategyAutomaton::new(params, sizing, Wallet::new(100.0, 100.0 / first.price));

        for bar in frame.snapshots() {
            let before = value(&automaton.state().wallet, bar);
            let events = automaton.step(bar).unwrap();
            let fees: f64 = events.iter().filter_map(|e| e.fill()).map(|f| f.fee).sum();
            let after = value(&automaton.state().wallet, bar);
            prop_assert!(
                (after - (before - fees)).abs() <= 1e-9 * before.max(1.0),
                "before {} after {} fees {}", before, after, fees
            );
            prop_assert!(automaton.state().wallet.usd >= 0.0);
            prop_assert!(automaton.state().wallet.asset >= 0.0);
        }
    }
}

// ── 6. Determinism ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn backtest_is_bit_identical_across_runs(ranges in arb_ranges(), params in arb_params()) {
        let series = to_series(&ranges);
        let config = EngineConfig::default();
        match (run_backtest(&series, &params, &config), run_backtest(&series, &params, &config)) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.wallet_end.to_bits(), b.wallet_end.to_bits());
                prop_assert_eq!(a.action_gain_loss.to_bits(), b.action_gain_loss.to_bits());
                prop_assert_eq!(a.delta.to_bits(), b.delta.to_bits());
                prop_assert_eq!(a.events, b.events);
            }
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "runs disagreed on success"),
        }
    }
}
