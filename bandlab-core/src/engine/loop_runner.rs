//! Bar-by-bar replay of the strategy automaton over an aligned frame.

use tracing::{debug, trace};

use crate::automaton::{StrategyAutomaton, Wallet};
use crate::domain::{ParameterSet, PriceSeries};

use super::precompute::{precompute_frame, AlignedFrame};
use super::state::{BacktestError, BacktestReport, EngineConfig, START_USD, WALLET_START};

/// Run one backtest of `params` over `series`.
///
/// Deterministic: the same series, parameters and config always produce a
/// bit-identical report.
pub fn run_backtest(
    series: &PriceSeries,
    params: &ParameterSet,
    config: &EngineConfig,
) -> Result<BacktestReport, BacktestError> {
    let frame = precompute_frame(series, params)?;
    run_frame(&frame, params, config)
}

/// Replay an already aligned frame.
///
/// The wallet starts as `START_USD` in cash plus `START_USD` worth of the
/// asset at the first aligned price.
pub fn run_frame(
    frame: &AlignedFrame,
    params: &ParameterSet,
    config: &EngineConfig,
) -> Result<BacktestReport, BacktestError> {
    let (first, last) = match (frame.first(), frame.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(BacktestError::InsufficientData {
                required: 1,
                available: 0,
            })
        }
    };

    let wallet = Wallet::new(START_USD, START_USD / first.price);
    let mut automaton = StrategyAutomaton::new(*params, config.sizing, wallet);
    let mut events = Vec::new();
    let mut fill_count = 0usize;

    for snapshot in frame.snapshots() {
        let step_events = automaton.step(snapshot)?;
        for event in &step_events {
            trace!(timestamp = %snapshot.timestamp, ?event, "automaton event");
            if event.fill().is_some() {
                fill_count += 1;
            }
        }
        if config.record_events {
            events.extend(step_events);
        }
    }

    let final_state = *automaton.state();
    let wallet_end = final_state.wallet.value_at(last.price);
    let action_gain_loss = (wallet_end - WALLET_START) / WALLET_START;
    let no_action_gain_loss = (last.price - first.price) / (2.0 * first.price);
    let delta = action_gain_loss - no_action_gain_loss;

    let days_covered = (last.timestamp - first.timestamp).num_seconds() as f64 / 86_400.0;
    let delta_per_day = (days_covered > 0.0).then(|| delta / days_covered);

    debug!(params = %params, delta, wallet_end, "backtest complete");

    Ok(BacktestReport {
        params: *params,
        sizing: config.sizing,
        bar_count: frame.len(),
        start: first.timestamp,
        end: last.timestamp,
        first_price: first.price,
        last_price: last.price,
        wallet_start: WALLET_START,
        wallet_end,
        action_gain_loss,
        no_action_gain_loss,
        delta,
        days_covered,
        delta_per_day,
        fill_count,
        final_state,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::Sizing;
    use crate::domain::Bar;
    use crate::indicators::assert_approx;
    use chrono::{Duration, NaiveDate};

    fn flat_series(n: usize, price: f64) -> PriceSeries {
        let t0 = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = (0..n)
            .map(|i| Bar {
                timestamp: t0 + Duration::hours(i as i64),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: None,
            })
            .collect();
        PriceSeries::new("FLAT", bars).unwrap()
    }

    fn wave_series(n: usize) -> PriceSeries {
        let t0 = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = (0..n)
            .map(|i| {
                let mid = 100.0 + 20.0 * (i as f64 * 0.35).sin();
                Bar {
                    timestamp: t0 + Duration::minutes(15 * i as i64),
                    open: mid,
                    high: mid + 1.5,
                    low: mid - 1.5,
                    close: mid,
                    volume: Some(1_000.0),
                }
            })
            .collect();
        PriceSeries::new("WAVE", bars).unwrap()
    }

    #[test]
    fn flat_market_holds_wallet_value() {
        let series = flat_series(24, 50.0);
        let report =
            run_backtest(&series, &ParameterSet::default(), &EngineConfig::default()).unwrap();
        assert_eq!(report.fill_count, 0);
        assert_approx(report.wallet_end, 200.0, 1e-9);
        assert_approx(report.action_gain_loss, 0.0, 1e-12);
        assert_eq!(report.no_action_gain_loss, 0.0);
        assert_approx(report.delta, 0.0, 1e-12);
    }

    #[test]
    fn metrics_follow_wallet_formulas() {
        let series = wave_series(120);
        let params = ParameterSet {
            rsi_period: 3,
            rsi_upper_bound: 70.0,
            rsi_lower_bound: 30.0,
            bb_period: 5,
            bb_level: 1.5,
            ..ParameterSet::default()
        };
        let report = run_backtest(&series, &params, &EngineConfig::default()).unwrap();

        let wallet = report.final_state.wallet;
        assert_eq!(report.wallet_end, wallet.usd + wallet.asset * report.last_price);
        assert_eq!(
            report.action_gain_loss,
            (report.wallet_end - 200.0) / 200.0
        );
        assert_eq!(
            report.no_action_gain_loss,
            (report.last_price - report.first_price) / (2.0 * report.first_price)
        );
        assert_eq!(report.delta, report.action_gain_loss - report.no_action_gain_loss);
        assert!(report.fill_count > 0);
        assert_eq!(report.bar_count, 116);
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let series = wave_series(200);
        let params = ParameterSet::default();
        let a = run_backtest(&series, &params, &EngineConfig::default()).unwrap();
        let b = run_backtest(&series, &params, &EngineConfig::default()).unwrap();
        assert_eq!(a.wallet_end.to_bits(), b.wallet_end.to_bits());
        assert_eq!(a.action_gain_loss.to_bits(), b.action_gain_loss.to_bits());
        assert_eq!(a.delta.to_bits(), b.delta.to_bits());
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn sweep_config_drops_events_but_not_metrics() {
        let series = wave_series(150);
        let params = ParameterSet::default();
        let full = run_backtest(&series, &params, &EngineConfig::default()).unwrap();
        let lean = run_backtest(&series, &params, &EngineConfig::for_sweep()).unwrap();
        assert!(lean.events.is_empty());
        assert_eq!(full.delta.to_bits(), lean.delta.to_bits());
    }

    #[test]
    fn delta_per_day_uses_covered_span() {
        let series = flat_series(49, 10.0);
        let report =
            run_backtest(&series, &ParameterSet::default(), &EngineConfig::default()).unwrap();
        // aligned window: hours 3..=48
        assert_approx(report.days_covered, 45.0 / 24.0, 1e-12);
        assert!(report.delta_per_day.is_some());
    }

    #[test]
    fn short_series_is_reported_not_panicked() {
        let series = flat_series(3, 10.0);
        let err = run_backtest(&series, &ParameterSet::default(), &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InsufficientData { .. }));
    }

    #[test]
    fn graduated_sizing_is_carried_into_report() {
        let series = wave_series(120);
        let config = EngineConfig {
            sizing: Sizing::Graduated,
            record_events: true,
        };
        let report = run_backtest(&series, &ParameterSet::default(), &config).unwrap();
        assert_eq!(report.sizing, Sizing::Graduated);
        for fill in report.fills() {
            assert!([1.0 / 3.0, 0.5, 0.99].contains(&fill.portion));
        }
    }
}
