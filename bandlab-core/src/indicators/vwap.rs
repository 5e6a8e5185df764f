//! Volume-weighted average price over the whole series.
//!
//! VWAP[t] = sum(typical * volume) / sum(volume) for bars 0..=t,
//! typical = (high + low + close) / 3. NaN while cumulative volume is zero.

pub fn vwap(high: &[f64], low: &[f64], close: &[f64], volume: &[f64]) -> Vec<f64> {
    let n = high.len();
    if low.len() != n || close.len() != n || volume.len() != n {
        return Vec::new();
    }

    let mut cum_pv = 0.0;
    let mut cum_v = 0.0;
    (0..n)
        .map(|i| {
            let typical = (high[i] + low[i] + close[i]) / 3.0;
            cum_pv += typical * volume[i];
            cum_v += volume[i];
            if cum_v == 0.0 {
                f64::NAN
            } else {
                cum_pv / cum_v
            }
        })
        .collect()
}
