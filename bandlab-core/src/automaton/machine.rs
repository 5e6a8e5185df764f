//! Per-bar advance of the sell, buy and stop-loss sub-automata.
//!
//! Order within one bar is fixed: sell sub-automaton, then buy, then stop-loss.
//! A period is never entered and exited on the same bar. Each step works on a
//! copy of the state and commits it only once every sub-automaton has run, so
//! a rejected bar leaves the automaton exactly as it was.

use crate::domain::ParameterSet;
use crate::signal::{BarSignals, BarSnapshot, Signal};

use super::{
    AutomatonError, AutomatonEvent, AutomatonState, Fill, FillReason, Side, Sizing, StopLoss,
    Wallet,
};

#[derive(Debug, Clone)]
pub struct StrategyAutomaton {
    params: ParameterSet,
    sizing: Sizing,
    state: AutomatonState,
}

impl StrategyAutomaton {
    pub fn new(params: ParameterSet, sizing: Sizing, wallet: Wallet) -> Self {
        Self::with_state(params, sizing, AutomatonState::new(wallet))
    }

    pub fn with_state(params: ParameterSet, sizing: Sizing, state: AutomatonState) -> Self {
        Self {
            params,
            sizing,
            state,
        }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn sizing(&self) -> Sizing {
        self.sizing
    }

    pub fn state(&self) -> &AutomatonState {
        &self.state
    }

    /// Neither a sell nor a buy period is open.
    pub fn is_idle(&self) -> bool {
        !self.state.in_sell_period && !self.state.in_buy_period
    }

    /// Swap in a new parameter set. Wallet, stop-loss and levels carry over.
    pub fn replace_params(&mut self, params: ParameterSet) {
        self.params = params;
    }

    pub fn set_period_flags(&mut self, in_sell_period: bool, in_buy_period: bool) {
        self.state.in_sell_period = in_sell_period;
        self.state.in_buy_period = in_buy_period;
    }

    /// Advance all three sub-automata by one bar.
    pub fn step(&mut self, bar: &BarSnapshot) -> Result<Vec<AutomatonEvent>, AutomatonError> {
        if !bar.is_finite() {
            return Err(AutomatonError::NonFiniteInput {
                timestamp: bar.timestamp,
            });
        }
        if bar.price <= 0.0 {
            return Err(AutomatonError::NonPositivePrice {
                timestamp: bar.timestamp,
                price: bar.price,
            });
        }

        let signals = BarSignals::classify(bar, &self.params);
        let slp = self.params.stop_loss_portion;
        let stops = self.params.stop_loss_enabled;
        let mut next = self.state;
        let mut events = Vec::new();

        if !next.in_sell_period {
            if signals.opens(Signal::Sell) {
                next.in_sell_period = true;
                events.push(AutomatonEvent::SellPeriodEntered {
                    timestamp: bar.timestamp,
                });
            }
        } else if signals.closes(Signal::Sell) {
            next.in_sell_period = false;
            let fill = self.settle(&mut next, bar, Side::Sell, FillReason::Signal);
            events.push(AutomatonEvent::Filled(fill));
            if stops {
                next.stop_loss = next.stop_loss.after_sell(bar, slp);
            }
        }

        if !next.in_buy_period {
            if signals.opens(Signal::Buy) {
                next.in_buy_period = true;
                events.push(AutomatonEvent::BuyPeriodEntered {
                    timestamp: bar.timestamp,
                });
            }
        } else if signals.closes(Signal::Buy) {
            next.in_buy_period = false;
            let fill = self.settle(&mut next, bar, Side::Buy, FillReason::Signal);
            events.push(AutomatonEvent::Filled(fill));
            if stops {
                next.stop_loss = next.stop_loss.after_buy(bar, slp);
            }
        }

        if stops {
            next.stop_loss = next.stop_loss.ratchet(bar, slp);
            if let Some(side) = next.stop_loss.breach(bar) {
                let fill = self.settle(&mut next, bar, side, FillReason::StopLoss);
                events.push(AutomatonEvent::Filled(fill));
                next.stop_loss = match side {
                    Side::Sell => StopLoss::Upper(StopLoss::ceiling(bar, slp)),
                    Side::Buy => StopLoss::Lower(StopLoss::floor(bar, slp)),
                };
            }
        }

        self.state = next;
        Ok(events)
    }

    fn settle(
        &self,
        state: &mut AutomatonState,
        bar: &BarSnapshot,
        side: Side,
        reason: FillReason,
    ) -> Fill {
        let level = match side {
            Side::Sell => state.sell_level,
            Side::Buy => state.buy_level,
        };
        let portion = match reason {
            FillReason::Signal => self.sizing.signal_portion(&self.params, level),
            FillReason::StopLoss => self.sizing.stop_loss_portion(&self.params),
        };

        let fee = match side {
            Side::Sell => state.wallet.sell(bar.price, portion),
            Side::Buy => state.wallet.buy(bar.price, portion),
        };

        match (reason, side) {
            (FillReason::Signal, Side::Sell) => {
                state.sell_level = state.sell_level.saturating_add(1);
                state.buy_level = 1;
            }
            (FillReason::Signal, Side::Buy) => {
                state.buy_level = state.buy_level.saturating_add(1);
                state.sell_level = 1;
            }
            (FillReason::StopLoss, _) => {
                state.sell_level = 1;
                state.buy_level = 1;
            }
        }

        Fill {
            timestamp: bar.timestamp,
            side,
            reason,
            price: bar.price,
            portion,
            level,
            fee,
            wallet: state.wallet,
        }
    }
}
