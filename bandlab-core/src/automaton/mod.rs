//! Strategy automaton: three sub-automata (sell, buy, stop-loss) advanced once
//! per aligned bar against a single simulated wallet.

pub mod machine;
pub mod sizing;
pub mod state;
pub mod stop_loss;

pub use machine::StrategyAutomaton;
pub use sizing::{Sizing, GRADUATED_LADDER};
pub use state::{AutomatonState, Wallet, FEE_RATE, RETAINED};
pub use stop_loss::StopLoss;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillReason {
    /// Exit of a sell or buy period.
    Signal,
    /// Forced by a breached stop-loss threshold.
    StopLoss,
}

/// One settled conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: NaiveDateTime,
    pub side: Side,
    pub reason: FillReason,
    pub price: f64,
    pub portion: f64,
    /// Sizing level the portion was drawn from.
    pub level: u32,
    /// Fee paid, in USD.
    pub fee: f64,
    /// Balances after settlement.
    pub wallet: Wallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AutomatonEvent {
    SellPeriodEntered { timestamp: NaiveDateTime },
    BuyPeriodEntered { timestamp: NaiveDateTime },
    Filled(Fill),
}

impl AutomatonEvent {
    pub fn fill(&self) -> Option<&Fill> {
        match self {
            AutomatonEvent::Filled(fill) => Some(fill),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AutomatonError {
    #[error("non-finite indicator or price at {timestamp}")]
    NonFiniteInput { timestamp: NaiveDateTime },

    #[error("non-positive price {price} at {timestamp}")]
    NonPositivePrice {
        timestamp: NaiveDateTime,
        price: f64,
    },
}
