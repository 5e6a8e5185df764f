//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window. Output length: len - (period - 1).

/// Rolling arithmetic mean. Returns an empty vector when `period` is zero or
/// longer than the input.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    result.push(sum / period as f64);

    // Roll the window forward
    for i in period..values.len() {
        sum = sum - values[i - period] + values[i];
        result.push(sum / period as f64);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let result = sma(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5);

        assert_eq!(result.len(), 3);
        // mean(10..=14) = 12, mean(11..=15) = 13, mean(12..=16) = 14
        assert_approx(result[0], 12.0, DEFAULT_EPSILON);
        assert_approx(result[1], 13.0, DEFAULT_EPSILON);
        assert_approx(result[2], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_identity() {
        assert_eq!(sma(&[100.0, 200.0, 300.0], 1), vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn sma_period_equal_to_len_yields_one_value() {
        let result = sma(&[1.0, 2.0, 3.0], 3);
        assert_eq!(result.len(), 1);
        assert_approx(result[0], 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_values() {
        assert!(sma(&[10.0, 11.0], 5).is_empty());
        assert!(sma(&[10.0, 11.0], 0).is_empty());
    }
}
