//! MACD: difference of a fast and a slow EMA, with an EMA signal line.

use super::ema::ema;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Standard settings are (12, 26, 9).
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    if fast_ema.is_empty() || slow_ema.is_empty() {
        return Macd::default();
    }

    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);
    if signal_line.is_empty() {
        return Macd::default();
    }
    let histogram = line.iter().zip(&signal_line).map(|(l, s)| l - s).collect();

    Macd {
        line,
        signal: signal_line,
        histogram,
    }
}
