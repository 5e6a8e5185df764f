//! Indicator functions over plain `f64` series.
//!
//! Every function is pure: it borrows its input and returns a new vector.
//! Windowed indicators (SMA, rolling stddev, Bollinger, RSI) drop the warm-up
//! points instead of padding them, so an output of length `m` computed with
//! period `p` starts at source index `p - 1`. Too little input yields an empty
//! vector, never a panic.
//!
//! Recursive and cumulative indicators (EMA, MACD, VWAP) keep the input
//! length. Ichimoku is displaced in time and uses NaN for undefined slots.

pub mod bollinger;
pub mod ema;
pub mod ichimoku;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod vwap;

pub use bollinger::{bollinger_bands, rolling_stddev, BollingerBands};
pub use ema::ema;
pub use ichimoku::{ichimoku, Ichimoku, IchimokuConfig};
pub use macd::{macd, Macd};
pub use rsi::rsi;
pub use sma::sma;
pub use vwap::vwap;

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
