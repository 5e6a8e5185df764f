//! Trailing stop-loss thresholds.
//!
//! At most one threshold is armed at a time. After a sell the ceiling is armed
//! (a break above it forces a buy back in); after a buy the floor is armed
//! (a break below it forces a sell).
//!
//! Ratchet invariant: an armed floor never decreases and an armed ceiling never
//! increases until it fires or the opposite fill replaces it.

use serde::{Deserialize, Serialize};

use crate::signal::BarSnapshot;

use super::Side;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StopLoss {
    Inactive,
    /// Forces a buy when `high` breaks above this price.
    Upper(f64),
    /// Forces a sell when `low` breaks below this price.
    Lower(f64),
}

impl StopLoss {
    /// Ceiling candidate for this bar: max(bb_middle, high) * (1 + portion).
    pub fn ceiling(bar: &BarSnapshot, portion: f64) -> f64 {
        bar.bb_middle.max(bar.high) * (1.0 + portion)
    }

    /// Floor candidate for this bar: min(bb_middle, low) * (1 - portion).
    pub fn floor(bar: &BarSnapshot, portion: f64) -> f64 {
        bar.bb_middle.min(bar.low) * (1.0 - portion)
    }

    pub fn upper(&self) -> Option<f64> {
        match self {
            StopLoss::Upper(v) => Some(*v),
            _ => None,
        }
    }

    pub fn lower(&self) -> Option<f64> {
        match self {
            StopLoss::Lower(v) => Some(*v),
            _ => None,
        }
    }

    /// Arm the ceiling unless it is already armed; drops any floor.
    pub fn after_sell(self, bar: &BarSnapshot, portion: f64) -> Self {
        match self {
            StopLoss::Upper(_) => self,
            _ => StopLoss::Upper(Self::ceiling(bar, portion)),
        }
    }

    /// Arm the floor unless it is already armed; drops any ceiling.
    pub fn after_buy(self, bar: &BarSnapshot, portion: f64) -> Self {
        match self {
            StopLoss::Lower(_) => self,
            _ => StopLoss::Lower(Self::floor(bar, portion)),
        }
    }

    /// Tighten the armed threshold toward this bar's price.
    pub fn ratchet(self, bar: &BarSnapshot, portion: f64) -> Self {
        match self {
            StopLoss::Inactive => self,
            StopLoss::Upper(u) => StopLoss::Upper(u.min(Self::ceiling(bar, portion))),
            StopLoss::Lower(l) => StopLoss::Lower(l.max(Self::floor(bar, portion))),
        }
    }

    /// The forced fill this bar triggers, if any.
    pub fn breach(&self, bar: &BarSnapshot) -> Option<Side> {
        match *self {
            StopLoss::Lower(l) if bar.low < l => Some(Side::Sell),
            StopLoss::Upper(u) if bar.high > u => Some(Side::Buy),
            _ => None,
        }
    }
}
