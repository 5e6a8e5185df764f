//! Automaton state and wallet settlement.

use serde::{Deserialize, Serialize};

use super::stop_loss::StopLoss;

/// Flat fee taken off every conversion.
pub const FEE_RATE: f64 = 0.005;
/// Share of a conversion that survives the fee.
pub const RETAINED: f64 = 0.995;

/// Cash and asset balances of one simulated account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub usd: f64,
    pub asset: f64,
}

impl Wallet {
    pub fn new(usd: f64, asset: f64) -> Self {
        Self { usd, asset }
    }

    /// Mark-to-market value in USD.
    pub fn value_at(&self, price: f64) -> f64 {
        self.usd + self.asset * price
    }

    /// Convert `portion` of the asset into USD at `price`. Returns the fee in USD.
    pub fn sell(&mut self, price: f64, portion: f64) -> f64 {
        let converted = self.asset * portion * price;
        self.usd += self.asset * price * RETAINED * portion;
        self.asset *= 1.0 - portion;
        converted * FEE_RATE
    }

    /// Convert `portion` of the USD into asset at `price`. Returns the fee in USD.
    pub fn buy(&mut self, price: f64, portion: f64) -> f64 {
        let converted = self.usd * portion;
        self.asset += self.usd * RETAINED * portion / price;
        self.usd *= 1.0 - portion;
        converted * FEE_RATE
    }
}

/// Everything one automaton run mutates, bar by bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomatonState {
    pub in_sell_period: bool,
    pub in_buy_period: bool,
    pub stop_loss: StopLoss,
    pub wallet: Wallet,
    /// Consecutive same-direction fill counters, starting at 1.
    pub sell_level: u32,
    pub buy_level: u32,
}

impl AutomatonState {
    pub fn new(wallet: Wallet) -> Self {
        Self {
            in_sell_period: false,
            in_buy_period: false,
            stop_loss: StopLoss::Inactive,
            wallet,
            sell_level: 1,
            buy_level: 1,
        }
    }
}
