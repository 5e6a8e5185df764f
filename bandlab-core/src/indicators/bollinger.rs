//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(x, period)
//! - Upper: middle + level * stddev(x, period)
//! - Lower: middle - level * stddev(x, period)
//!
//! Uses sample stddev (divide by N - 1); a one-point window has zero width.
//! All three bands have length len - (period - 1).

use super::sma::sma;

/// The three bands, index-aligned with each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    pub fn len(&self) -> usize {
        self.middle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middle.is_empty()
    }
}

/// Rolling sample standard deviation, two-pass per window.
pub fn rolling_stddev(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    values
        .windows(period)
        .map(|window| {
            if period < 2 {
                return 0.0;
            }
            let mean = window.iter().sum::<f64>() / period as f64;
            let variance = window
                .iter()
                .map(|v| {
                    let diff = v - mean;
                    diff * diff
                })
                .sum::<f64>()
                / (period - 1) as f64;
            variance.sqrt()
        })
        .collect()
}

pub fn bollinger_bands(values: &[f64], period: usize, level: f64) -> BollingerBands {
    let middle = sma(values, period);
    let stddev = rolling_stddev(values, period);
    if middle.is_empty() {
        return BollingerBands::default();
    }

    let upper = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m + s * level)
        .collect();
    let lower = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m - s * level)
        .collect();

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn bollinger_middle_is_sma() {
        let bands = bollinger_bands(&[10.0, 11.0, 12.0, 13.0, 14.0], 3, 2.0);
        assert_eq!(bands.len(), 3);
        assert_approx(bands.middle[0], 11.0, DEFAULT_EPSILON);
        assert_approx(bands.middle[1], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_uses_sample_stddev() {
        // Window [10, 11, 12]: sample variance = (1 + 0 + 1) / 2 = 1
        let bands = bollinger_bands(&[10.0, 11.0, 12.0], 3, 2.0);
        assert_approx(bands.upper[0], 13.0, DEFAULT_EPSILON);
        assert_approx(bands.lower[0], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_bands_symmetric() {
        let bands = bollinger_bands(&[10.0, 11.0, 15.0, 13.0, 14.0], 3, 2.5);
        for i in 0..bands.len() {
            let half_width = bands.upper[i] - bands.middle[i];
            assert_approx(bands.middle[i] - bands.lower[i], half_width, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn bollinger_constant_price_zero_width() {
        let bands = bollinger_bands(&[100.0; 4], 3, 2.0);
        assert_eq!(bands.upper, vec![100.0, 100.0]);
        assert_eq!(bands.lower, vec![100.0, 100.0]);
    }

    #[test]
    fn bollinger_too_few_values_is_empty() {
        assert!(bollinger_bands(&[1.0, 2.0], 3, 2.0).is_empty());
    }

    #[test]
    fn single_point_window_has_zero_stddev() {
        assert_eq!(rolling_stddev(&[1.0, 5.0], 1), vec![0.0, 0.0]);
    }
}
