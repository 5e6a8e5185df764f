//! Ichimoku cloud.
//!
//! - Conversion (tenkan): midpoint of the highest high and lowest low over `conversion` bars
//! - Base (kijun): same over `base` bars
//! - Leading span A: (conversion + base) / 2, projected `displacement` bars forward
//! - Leading span B: midpoint over `leading` bars, projected `displacement` bars forward
//! - Lagging span: close shifted `lag` bars back
//!
//! Conversion, base and lagging have the input length. The leading spans have
//! `len + displacement` slots so the projection past the last bar is kept.
//! Undefined slots hold NaN.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IchimokuConfig {
    pub conversion: usize,
    pub base: usize,
    pub leading: usize,
    pub displacement: usize,
    pub lag: usize,
}

impl Default for IchimokuConfig {
    fn default() -> Self {
        Self {
            conversion: 9,
            base: 26,
            leading: 52,
            displacement: 26,
            lag: 22,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ichimoku {
    pub conversion: Vec<f64>,
    pub base: Vec<f64>,
    pub leading_span_a: Vec<f64>,
    pub leading_span_b: Vec<f64>,
    pub lagging: Vec<f64>,
}

pub fn ichimoku(high: &[f64], low: &[f64], close: &[f64], config: IchimokuConfig) -> Ichimoku {
    let n = high.len();
    if low.len() != n || close.len() != n || n == 0 {
        return Ichimoku::default();
    }

    let conversion = donchian_mid(high, low, config.conversion);
    let base = donchian_mid(high, low, config.base);
    let span_a: Vec<f64> = conversion
        .iter()
        .zip(&base)
        .map(|(c, b)| (c + b) / 2.0)
        .collect();
    let span_b = donchian_mid(high, low, config.leading);

    let lagging = (0..n)
        .map(|i| close.get(i + config.lag).copied().unwrap_or(f64::NAN))
        .collect();

    Ichimoku {
        conversion,
        base,
        leading_span_a: displace_forward(&span_a, config.displacement),
        leading_span_b: displace_forward(&span_b, config.displacement),
        lagging,
    }
}

/// (rolling max high + rolling min low) / 2, NaN before the window fills.
fn donchian_mid(high: &[f64], low: &[f64], period: usize) -> Vec<f64> {
    let n = high.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let start = i + 1 - period;
        let hh = high[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ll = low[start..=i].iter().copied().fold(f64::INFINITY, f64::min);
        result[i] = (hh + ll) / 2.0;
    }
    result
}

fn displace_forward(values: &[f64], shift: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len() + shift];
    result[shift..].copy_from_slice(values);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    fn small_config() -> IchimokuConfig {
        IchimokuConfig {
            conversion: 2,
            base: 3,
            leading: 4,
            displacement: 2,
            lag: 1,
        }
    }

    #[test]
    fn lengths_include_forward_projection() {
        let high = [11.0, 12.0, 13.0, 14.0, 15.0];
        let low = [9.0, 10.0, 11.0, 12.0, 13.0];
        let close = [10.0, 11.0, 12.0, 13.0, 14.0];
        let ich = ichimoku(&high, &low, &close, small_config());
        assert_eq!(ich.conversion.len(), 5);
        assert_eq!(ich.leading_span_a.len(), 7);
        assert_eq!(ich.leading_span_b.len(), 7);
        assert_eq!(ich.lagging.len(), 5);
    }

    #[test]
    fn conversion_is_window_midpoint() {
        let high = [11.0, 12.0, 13.0, 14.0, 15.0];
        let low = [9.0, 10.0, 11.0, 12.0, 13.0];
        let close = [10.0, 11.0, 12.0, 13.0, 14.0];
        let ich = ichimoku(&high, &low, &close, small_config());
        assert!(ich.conversion[0].is_nan());
        // window [0,1]: (12 + 9) / 2
        assert_approx(ich.conversion[1], 10.5, DEFAULT_EPSILON);
        // span A at bar 2 lands on slot 4
        assert_approx(
            ich.leading_span_a[4],
            (ich.conversion[2] + ich.base[2]) / 2.0,
            DEFAULT_EPSILON,
        );
        assert!(ich.leading_span_a[0].is_nan());
    }

    #[test]
    fn lagging_shifts_close_back() {
        let high = [2.0, 3.0, 4.0];
        let low = [1.0, 2.0, 3.0];
        let close = [1.5, 2.5, 3.5];
        let ich = ichimoku(&high, &low, &close, small_config());
        assert_eq!(ich.lagging[0], 2.5);
        assert_eq!(ich.lagging[1], 3.5);
        assert!(ich.lagging[2].is_nan());
    }

    #[test]
    fn default_config_matches_classic_settings() {
        let cfg = IchimokuConfig::default();
        assert_eq!((cfg.conversion, cfg.base, cfg.leading), (9, 26, 52));
        assert_eq!((cfg.displacement, cfg.lag), (26, 22));
    }
}
