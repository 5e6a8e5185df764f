//! ParameterSet: the immutable identity of one backtest run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("invalid parameter set: rsi_period must be >= 2, got {0}")]
    RsiPeriodTooShort(usize),

    #[error("invalid parameter set: bb_period {bb_period} is shorter than rsi_period {rsi_period}")]
    BbPeriodBelowRsiPeriod { rsi_period: usize, bb_period: usize },

    #[error("invalid parameter set: rsi_upper_bound must be within 50..=100, got {0}")]
    UpperBoundOutOfRange(f64),

    #[error("invalid parameter set: rsi_lower_bound must be within 0..=50, got {0}")]
    LowerBoundOutOfRange(f64),

    #[error("invalid parameter set: bb_level must be > 0, got {0}")]
    NonPositiveBbLevel(f64),

    #[error("invalid parameter set: portion must be within (0, 1], got {0}")]
    PortionOutOfRange(f64),

    #[error("invalid parameter set: stop_loss_portion must be within [0, 1), got {0}")]
    StopLossPortionOutOfRange(f64),
}

/// Indicator and sizing parameters for the RSI + Bollinger strategy.
///
/// `stop_loss_portion` widens the trailing thresholds away from the bar's
/// range; zero arms them at the range itself. Set `stop_loss_enabled` to
/// false to run without the stop-loss sub-automaton.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub rsi_period: usize,
    pub rsi_upper_bound: f64,
    pub rsi_lower_bound: f64,
    pub bb_period: usize,
    pub bb_level: f64,
    pub portion: f64,
    pub stop_loss_portion: f64,
    pub stop_loss_enabled: bool,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            rsi_period: 4,
            rsi_upper_bound: 82.0,
            rsi_lower_bound: 30.0,
            bb_period: 4,
            bb_level: 3.0,
            portion: 0.95,
            stop_loss_portion: 0.0235,
            stop_loss_enabled: true,
        }
    }
}

impl ParameterSet {
    /// Fail fast on any combination the engine cannot align or settle.
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.rsi_period < 2 {
            return Err(ParamError::RsiPeriodTooShort(self.rsi_period));
        }
        if self.bb_period < self.rsi_period {
            return Err(ParamError::BbPeriodBelowRsiPeriod {
                rsi_period: self.rsi_period,
                bb_period: self.bb_period,
            });
        }
        if !(50.0..=100.0).contains(&self.rsi_upper_bound) {
            return Err(ParamError::UpperBoundOutOfRange(self.rsi_upper_bound));
        }
        if !(0.0..=50.0).contains(&self.rsi_lower_bound) {
            return Err(ParamError::LowerBoundOutOfRange(self.rsi_lower_bound));
        }
        if !(self.bb_level > 0.0) || !self.bb_level.is_finite() {
            return Err(ParamError::NonPositiveBbLevel(self.bb_level));
        }
        if !(self.portion > 0.0 && self.portion <= 1.0) {
            return Err(ParamError::PortionOutOfRange(self.portion));
        }
        if !(0.0..1.0).contains(&self.stop_loss_portion) {
            return Err(ParamError::StopLossPortionOutOfRange(self.stop_loss_portion));
        }
        Ok(())
    }
}

impl std::fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rsi({}, {}/{}) bb({}, {}) portion={} ",
            self.rsi_period,
            self.rsi_upper_bound,
            self.rsi_lower_bound,
            self.bb_period,
            self.bb_level,
            self.portion
        )?;
        if self.stop_loss_enabled {
            write!(f, "stop_loss={}", self.stop_loss_portion)
        } else {
            write!(f, "stop_loss=off")
        }
    }
}
