//! Markdown reports for backtests and sweeps, plus a snapshot of the
//! ancillary indicators (MACD, VWAP, Ichimoku) at the last bar.
//!
//! The ancillary indicators are informational only; the automaton never reads
//! them.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use bandlab_core::automaton::{AutomatonEvent, Fill, FillReason, Side};
use bandlab_core::domain::PriceSeries;
use bandlab_core::engine::BacktestReport;
use bandlab_core::indicators::{ichimoku, macd, vwap, IchimokuConfig};

use crate::sweep::SweepReport;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdSnapshot {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IchimokuSnapshot {
    pub conversion: f64,
    pub base: f64,
    /// Leading spans as projected onto the last bar.
    pub leading_span_a: f64,
    pub leading_span_b: f64,
}

/// Last defined value of each ancillary indicator. `None` when the series is
/// too short (or, for VWAP, has no volume).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSummary {
    pub macd: Option<MacdSnapshot>,
    pub vwap: Option<f64>,
    pub ichimoku: Option<IchimokuSnapshot>,
}

impl IndicatorSummary {
    pub fn from_series(series: &PriceSeries) -> Self {
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();

        let m = macd(&closes, 12, 26, 9);
        let macd = match (m.line.last(), m.signal.last(), m.histogram.last()) {
            (Some(&line), Some(&signal), Some(&histogram)) => Some(MacdSnapshot {
                line,
                signal,
                histogram,
            }),
            _ => None,
        };

        let vwap = series
            .volumes()
            .and_then(|volumes| vwap(&highs, &lows, &closes, &volumes).last().copied())
            .filter(|v| v.is_finite());

        let cloud = ichimoku(&highs, &lows, &closes, IchimokuConfig::default());
        let ichimoku = closes.len().checked_sub(1).and_then(|last| {
            let snapshot = IchimokuSnapshot {
                conversion: *cloud.conversion.get(last)?,
                base: *cloud.base.get(last)?,
                leading_span_a: *cloud.leading_span_a.get(last)?,
                leading_span_b: *cloud.leading_span_b.get(last)?,
            };
            [
                snapshot.conversion,
                snapshot.base,
                snapshot.leading_span_a,
                snapshot.leading_span_b,
            ]
            .iter()
            .all(|v| v.is_finite())
            .then_some(snapshot)
        });

        Self {
            macd,
            vwap,
            ichimoku,
        }
    }
}

fn action_label(fill: &Fill) -> &'static str {
    match (fill.reason, fill.side) {
        (FillReason::Signal, Side::Sell) => "execute sell",
        (FillReason::Signal, Side::Buy) => "execute buy",
        (FillReason::StopLoss, Side::Sell) => "stop-loss sell",
        (FillReason::StopLoss, Side::Buy) => "stop-loss buy",
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

/// Render one backtest as markdown.
pub fn backtest_markdown(report: &BacktestReport, indicators: &IndicatorSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# BandLab Backtest\n");
    let _ = writeln!(out, "Parameters: `{}` ({:?} sizing)\n", report.params, report.sizing);
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out, "- Bars: {} ({} to {})", report.bar_count, report.start, report.end);
    let _ = writeln!(out, "- Price: {:.4} -> {:.4}", report.first_price, report.last_price);
    let _ = writeln!(
        out,
        "- Wallet value: {:.4} -> {:.4}",
        report.wallet_start, report.wallet_end
    );
    let _ = writeln!(
        out,
        "- Strategy gain/loss: {:+.4}%",
        report.action_gain_loss * 100.0
    );
    let _ = writeln!(
        out,
        "- Buy and hold gain/loss: {:+.4}%",
        report.no_action_gain_loss * 100.0
    );
    let _ = writeln!(out, "- Delta: {:+.4}", report.delta);
    let _ = writeln!(
        out,
        "- Delta per day: {} over {:.2} days",
        fmt_opt(report.delta_per_day, 4),
        report.days_covered
    );
    let _ = writeln!(out, "- Fills: {}", report.fill_count);

    if !report.events.is_empty() {
        let _ = writeln!(out, "\n## Action log\n");
        let _ = writeln!(out, "| Time | Action | Price | Portion | Fee |");
        let _ = writeln!(out, "|------|--------|-------|---------|-----|");
        for event in &report.events {
            let _ = match event {
                AutomatonEvent::SellPeriodEntered { timestamp } => {
                    writeln!(out, "| {timestamp} | enter sell period | | | |")
                }
                AutomatonEvent::BuyPeriodEntered { timestamp } => {
                    writeln!(out, "| {timestamp} | enter buy period | | | |")
                }
                AutomatonEvent::Filled(fill) => writeln!(
                    out,
                    "| {} | {} | {:.4} | {:.2}% | {:.4} |",
                    fill.timestamp,
                    action_label(fill),
                    fill.price,
                    fill.portion * 100.0,
                    fill.fee
                ),
            };
        }
    }

    let _ = writeln!(out, "\n## Indicators at last bar");
    match indicators.macd {
        Some(m) => {
            let _ = writeln!(
                out,
                "- MACD(12,26,9): line {:.4}, signal {:.4}, histogram {:+.4}",
                m.line, m.signal, m.histogram
            );
        }
        None => {
            let _ = writeln!(out, "- MACD(12,26,9): n/a");
        }
    }
    let _ = writeln!(out, "- VWAP: {}", fmt_opt(indicators.vwap, 4));
    match indicators.ichimoku {
        Some(i) => {
            let _ = writeln!(
                out,
                "- Ichimoku: conversion {:.4}, base {:.4}, span A {:.4}, span B {:.4}",
                i.conversion, i.base, i.leading_span_a, i.leading_span_b
            );
        }
        None => {
            let _ = writeln!(out, "- Ichimoku: n/a");
        }
    }
    out
}

/// Render a sweep result table as markdown.
pub fn sweep_markdown(report: &SweepReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# BandLab Sweep: {}\n", report.symbol);
    let _ = writeln!(out, "Dataset: `{}` ({} bars)\n", report.dataset_hash, report.bar_count);
    let _ = writeln!(
        out,
        "Evaluated {} combinations, skipped {}.\n",
        report.evaluated, report.skipped
    );
    let _ = writeln!(
        out,
        "| # | RSI | Upper | Lower | BB | Level | Delta | Delta/day | Fills |"
    );
    let _ = writeln!(
        out,
        "|---|-----|-------|-------|----|-------|-------|-----------|-------|"
    );
    for (rank, entry) in report.entries.iter().enumerate() {
        let p = &entry.params;
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {:+.4} | {} | {} |",
            rank + 1,
            p.rsi_period,
            p.rsi_upper_bound,
            p.rsi_lower_bound,
            p.bb_period,
            p.bb_level,
            entry.delta,
            fmt_opt(entry.delta_per_day, 4),
            entry.fill_count
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandlab_core::domain::{Bar, ParameterSet};
    use bandlab_core::engine::{run_backtest, EngineConfig};
    use chrono::{Duration, NaiveDate};

    fn series(n: usize, with_volume: bool) -> PriceSeries {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = (0..n)
            .map(|i| {
                let mid = 100.0 + (i as f64 * 0.4).sin() * 5.0;
                Bar {
                    timestamp: t0 + Duration::minutes(5 * i as i64),
                    open: mid,
                    high: mid + 1.0,
                    low: mid - 1.0,
                    close: mid,
                    volume: with_volume.then_some(1_000.0),
                }
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    #[test]
    fn long_series_has_every_indicator() {
        let summary = IndicatorSummary::from_series(&series(120, true));
        assert!(summary.macd.is_some());
        assert!(summary.vwap.is_some());
        assert!(summary.ichimoku.is_some());
    }

    #[test]
    fn missing_volume_drops_vwap_only() {
        let summary = IndicatorSummary::from_series(&series(120, false));
        assert!(summary.vwap.is_none());
        assert!(summary.macd.is_some());
    }

    #[test]
    fn short_series_has_no_ichimoku() {
        let summary = IndicatorSummary::from_series(&series(20, true));
        assert!(summary.ichimoku.is_none());
    }

    #[test]
    fn backtest_markdown_lists_metrics() {
        let s = series(80, true);
        let report = run_backtest(&s, &ParameterSet::default(), &EngineConfig::default()).unwrap();
        let text = backtest_markdown(&report, &IndicatorSummary::from_series(&s));
        assert!(text.starts_with("# BandLab Backtest"));
        assert!(text.contains("- Delta: "));
        assert!(text.contains(&format!("- Fills: {}", report.fill_count)));
        assert!(text.contains("MACD(12,26,9)"));
    }

    #[test]
    fn gain_loss_is_rendered_in_percent() {
        // HL2 climbs 100 -> 120 over the aligned frame (rsi 3, bb 5 starts at bar 4)
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = (0..10)
            .map(|i| {
                let price = 100.0 + (i as f64 - 4.0) * 20.0 / 5.0;
                Bar {
                    timestamp: t0 + Duration::minutes(5 * i as i64),
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: None,
                }
            })
            .collect();
        let s = PriceSeries::new("TEST", bars).unwrap();
        let params = ParameterSet {
            rsi_period: 3,
            bb_period: 5,
            ..ParameterSet::default()
        };
        let report = run_backtest(&s, &params, &EngineConfig::default()).unwrap();
        assert_eq!((report.first_price, report.last_price), (100.0, 120.0));
        assert_eq!(report.no_action_gain_loss, 0.1);

        let text = backtest_markdown(&report, &IndicatorSummary::default());
        assert!(text.contains("- Buy and hold gain/loss: +10.0000%\n"));
        assert!(text.contains(&format!(
            "- Strategy gain/loss: {:+.4}%",
            report.action_gain_loss * 100.0
        )));
    }

    #[test]
    fn action_log_names_each_fill() {
        // flat, one upward spike, back to flat
        let mut s = series(10, false);
        let spiked: Vec<Bar> = s
            .bars()
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let (high, low) = if i == 5 { (160.0, 100.0) } else { (100.0, 100.0) };
                Bar {
                    open: (high + low) / 2.0,
                    high,
                    low,
                    close: (high + low) / 2.0,
                    ..b.clone()
                }
            })
            .collect();
        s = PriceSeries::new("TEST", spiked).unwrap();
        let params = ParameterSet {
            rsi_period: 3,
            rsi_upper_bound: 70.0,
            rsi_lower_bound: 30.0,
            bb_period: 3,
            bb_level: 2.0,
            portion: 0.95,
            stop_loss_portion: 0.0,
            stop_loss_enabled: false,
        };
        let report = run_backtest(&s, &params, &EngineConfig::default()).unwrap();
        let text = backtest_markdown(&report, &IndicatorSummary::default());
        assert!(text.contains("enter sell period"));
        assert!(text.contains("execute sell"));
        assert!(!text.contains("stop-loss"));
    }
}
