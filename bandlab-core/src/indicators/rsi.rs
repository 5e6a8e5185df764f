//! Relative Strength Index (RSI) with Wilder smoothing.
//!
//! Seed: the first `period - 1` deltas are accumulated as `gain / period` and
//! `loss / period`; the first value is emitted from that seed. Every later
//! delta is folded in with `avg = (avg * (period - 1) + x) / period`.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss), and 100 when avg_loss == 0.
//!
//! Output length: len - (period - 1) when len > period, otherwise empty.
//! Output index `k` belongs to source index `k + period - 1`.

pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    if period == 0 || n <= period {
        return Vec::new();
    }

    let p = period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..period {
        let change = values[i] - values[i - 1];
        if change >= 0.0 {
            avg_gain += change / p;
        } else {
            avg_loss += -change / p;
        }
    }

    let mut result = Vec::with_capacity(n - period + 1);
    result.push(rsi_value(avg_gain, avg_loss));

    for i in period..n {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change >= 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        result.push(rsi_value(avg_gain, avg_loss));
    }

    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
