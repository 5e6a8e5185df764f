//! Signal classification: maps one bar's indicator readings to SELL/BUY/HOLD.
//!
//! RSI and Bollinger are classified independently, then combined:
//! a period opens when both indicators say the same direction, and it closes
//! once neither indicator says that direction any more. Because a Bollinger
//! SELL is exactly `high > upper` and an RSI SELL is exactly `rsi > upper_bound`,
//! the combination is equivalent to the joint boundary check
//! `rsi > upper_bound && high > bb_upper` for entry.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::ParameterSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Sell,
    Buy,
    Hold,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Signal::Sell => "sell",
            Signal::Buy => "buy",
            Signal::Hold => "hold",
        };
        f.write_str(s)
    }
}

/// Everything the automaton needs to know about one aligned bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarSnapshot {
    pub timestamp: NaiveDateTime,
    /// Reference price (HL2) used for fills.
    pub price: f64,
    pub high: f64,
    pub low: f64,
    pub rsi: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
}

impl BarSnapshot {
    pub fn is_finite(&self) -> bool {
        [
            self.price,
            self.high,
            self.low,
            self.rsi,
            self.bb_upper,
            self.bb_middle,
            self.bb_lower,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

pub fn classify_rsi(rsi: f64, upper_bound: f64, lower_bound: f64) -> Signal {
    if rsi > upper_bound {
        Signal::Sell
    } else if rsi < lower_bound {
        Signal::Buy
    } else {
        Signal::Hold
    }
}

pub fn classify_bb(high: f64, low: f64, bb_upper: f64, bb_lower: f64) -> Signal {
    if high > bb_upper {
        Signal::Sell
    } else if low < bb_lower {
        Signal::Buy
    } else {
        Signal::Hold
    }
}

/// The pair of per-indicator signals for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarSignals {
    pub rsi: Signal,
    pub bb: Signal,
}

impl BarSignals {
    pub fn classify(bar: &BarSnapshot, params: &ParameterSet) -> Self {
        Self {
            rsi: classify_rsi(bar.rsi, params.rsi_upper_bound, params.rsi_lower_bound),
            bb: classify_bb(bar.high, bar.low, bar.bb_upper, bar.bb_lower),
        }
    }

    /// Both indicators agree on `side`.
    pub fn opens(&self, side: Signal) -> bool {
        self.rsi == side && self.bb == side
    }

    /// Neither indicator says `side` any more.
    pub fn closes(&self, side: Signal) -> bool {
        self.rsi != side && self.bb != side
    }
}
