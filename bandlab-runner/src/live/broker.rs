//! Order execution boundary.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandlab_core::automaton::{Side, Wallet};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("no usable price for {0}")]
    NoPrice(String),

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// A market order for a share of the current balance on one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrder {
    pub side: Side,
    pub base: String,
    pub quote: String,
    /// Share of the base balance (sell) or quote balance (buy), in (0, 1].
    pub portion: f64,
    /// Last observed price; simulated brokers fill at it, exchanges ignore it.
    pub reference_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Filled,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    pub status: OrderStatus,
    pub filled_price: Option<f64>,
    /// Base units bought or sold.
    pub filled_size: Option<f64>,
}

pub trait OrderExecutor: Send {
    fn place_market_order(&self, order: &MarketOrder) -> Result<OrderReport, OrderError>;
}

/// Simulated broker: settles against its own wallet at the order's reference
/// price, with the same fee the backtester charges.
#[derive(Debug)]
pub struct PaperBroker {
    wallet: Mutex<Wallet>,
}

impl PaperBroker {
    pub fn new(wallet: Wallet) -> Self {
        Self {
            wallet: Mutex::new(wallet),
        }
    }

    pub fn wallet(&self) -> Option<Wallet> {
        self.wallet.lock().ok().map(|w| *w)
    }
}

impl OrderExecutor for PaperBroker {
    fn place_market_order(&self, order: &MarketOrder) -> Result<OrderReport, OrderError> {
        if !(order.portion > 0.0 && order.portion <= 1.0) {
            return Err(OrderError::Rejected(format!(
                "portion {} outside (0, 1]",
                order.portion
            )));
        }
        let price = order.reference_price;
        if !(price.is_finite() && price > 0.0) {
            return Err(OrderError::NoPrice(order.base.clone()));
        }
        let mut wallet = self
            .wallet
            .lock()
            .map_err(|_| OrderError::Unavailable("paper wallet lock poisoned".into()))?;

        let before = wallet.asset;
        match order.side {
            Side::Sell => wallet.sell(price, order.portion),
            Side::Buy => wallet.buy(price, order.portion),
        };
        let filled_size = (wallet.asset - before).abs();

        Ok(OrderReport {
            status: OrderStatus::Filled,
            filled_price: Some(price),
            filled_size: Some(filled_size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: Side, portion: f64, reference_price: f64) -> MarketOrder {
        MarketOrder {
            side,
            base: "BTC".into(),
            quote: "USD".into(),
            portion,
            reference_price,
        }
    }

    #[test]
    fn paper_sell_settles_at_reference_price() {
        let broker = PaperBroker::new(Wallet::new(0.0, 2.0));
        let report = broker.place_market_order(&order(Side::Sell, 0.5, 50.0)).unwrap();
        assert_eq!(report.status, OrderStatus::Filled);
        assert_eq!(report.filled_price, Some(50.0));
        assert_eq!(report.filled_size, Some(1.0));
        let wallet = broker.wallet().unwrap();
        assert!((wallet.usd - 49.75).abs() < 1e-12);
    }

    #[test]
    fn paper_order_without_price_is_rejected() {
        let broker = PaperBroker::new(Wallet::new(100.0, 0.0));
        let err = broker
            .place_market_order(&order(Side::Buy, 0.5, f64::NAN))
            .unwrap_err();
        assert_eq!(err, OrderError::NoPrice("BTC".into()));
    }

    #[test]
    fn bad_portion_is_rejected() {
        let broker = PaperBroker::new(Wallet::new(100.0, 0.0));
        assert!(matches!(
            broker.place_market_order(&order(Side::Buy, 1.5, 10.0)),
            Err(OrderError::Rejected(_))
        ));
    }
}
