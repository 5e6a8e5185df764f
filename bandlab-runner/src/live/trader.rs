//! Live strategy loop.
//!
//! One cycle: adopt any pending parameter update, fetch bars, rebuild the
//! aligned frame, step a copy of the automaton on the newest bar and dispatch
//! the resulting events to the broker, the ledger and the notifier. The copy
//! replaces the live automaton only when every order went through; otherwise
//! the bar stays unprocessed and the next cycle steps it again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, info, warn};

use bandlab_core::automaton::{AutomatonError, AutomatonEvent, Fill, StrategyAutomaton};
use bandlab_core::engine::{precompute_frame, BacktestError};
use bandlab_core::signal::BarSnapshot;

use crate::data_loader::{FeedError, MarketData};
use crate::ledger::{LedgerEntry, TradeLedger};

use super::broker::{MarketOrder, OrderExecutor};
use super::notify::{notify_best_effort, Notifier};
use super::{sleep_unless_stopped, MarketSpec, ParameterUpdate};

#[derive(Debug, Error)]
pub enum TraderError {
    #[error("market data: {0}")]
    Feed(#[from] FeedError),

    #[error("indicator frame: {0}")]
    Backtest(#[from] BacktestError),

    #[error("automaton: {0}")]
    Automaton(#[from] AutomatonError),
}

/// Pacing of the supervisor loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub cycle: Duration,
    /// Pause after a failed cycle before trying again.
    pub retry_backoff: Duration,
    /// Stop after this many successful cycles; `None` runs until stopped.
    pub max_cycles: Option<u64>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            cycle: Duration::from_secs(60),
            retry_backoff: Duration::from_secs(10),
            max_cycles: None,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    /// The bar the automaton was stepped on, if a new one arrived.
    pub bar: Option<BarSnapshot>,
    pub events: Vec<AutomatonEvent>,
    pub params_updated: bool,
    /// Non-zero means the step was discarded and the bar will be retried.
    pub order_failures: usize,
    pub ledger_failures: usize,
}

/// Result of handing one event to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Done,
    OrderFailed,
    LedgerFailed,
}

pub struct LiveTrader {
    market: MarketSpec,
    feed: Arc<dyn MarketData>,
    executor: Box<dyn OrderExecutor>,
    notifier: Box<dyn Notifier>,
    ledger: Option<TradeLedger>,
    automaton: StrategyAutomaton,
    updates: Receiver<ParameterUpdate>,
    last_processed: Option<NaiveDateTime>,
}

impl LiveTrader {
    pub fn new(
        market: MarketSpec,
        feed: Arc<dyn MarketData>,
        executor: Box<dyn OrderExecutor>,
        notifier: Box<dyn Notifier>,
        automaton: StrategyAutomaton,
        updates: Receiver<ParameterUpdate>,
    ) -> Self {
        Self {
            market,
            feed,
            executor,
            notifier,
            ledger: None,
            automaton,
            updates,
            last_processed: None,
        }
    }

    pub fn with_ledger(mut self, ledger: TradeLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn automaton(&self) -> &StrategyAutomaton {
        &self.automaton
    }

    pub fn last_processed(&self) -> Option<NaiveDateTime> {
        self.last_processed
    }

    /// Run one strategy cycle.
    ///
    /// Broker, ledger and notifier failures are logged and counted, never
    /// returned. A rejected order leaves the automaton and `last_processed`
    /// untouched, and later orders from the same bar are not placed. A bar
    /// that is not newer than the last processed one is skipped.
    pub fn cycle(&mut self) -> Result<CycleOutcome, TraderError> {
        let mut outcome = CycleOutcome {
            params_updated: self.adopt_pending_update(),
            ..CycleOutcome::default()
        };

        let series = self
            .feed
            .fetch_bars(&self.market.symbol, self.market.interval, self.market.size)?;
        let frame = precompute_frame(&series, self.automaton.params())?;
        let Some(bar) = frame.last().copied() else {
            return Ok(outcome);
        };
        if self.last_processed.is_some_and(|seen| bar.timestamp <= seen) {
            debug!(timestamp = %bar.timestamp, "no new bar");
            return Ok(outcome);
        }

        let mut stepped = self.automaton.clone();
        let events = stepped.step(&bar)?;
        for event in &events {
            match self.dispatch(event) {
                Dispatch::Done => {}
                Dispatch::LedgerFailed => outcome.ledger_failures += 1,
                Dispatch::OrderFailed => {
                    outcome.order_failures += 1;
                    break;
                }
            }
        }

        if outcome.order_failures == 0 {
            self.automaton = stepped;
            self.last_processed = Some(bar.timestamp);
        } else {
            warn!(timestamp = %bar.timestamp, "order rejected; bar will be retried");
        }
        outcome.bar = Some(bar);
        outcome.events = events;
        Ok(outcome)
    }

    /// Supervisor loop: run cycles until `stop` is set or `max_cycles`
    /// successful cycles have completed. Returns the number of successful
    /// cycles.
    pub fn run(&mut self, settings: &LoopSettings, stop: &AtomicBool) -> u64 {
        let mut completed = 0u64;
        while !stop.load(Ordering::Relaxed) {
            if settings.max_cycles.is_some_and(|max| completed >= max) {
                break;
            }
            match self.cycle() {
                Ok(outcome) => {
                    completed += 1;
                    debug!(
                        cycle = completed,
                        events = outcome.events.len(),
                        order_failures = outcome.order_failures,
                        params_updated = outcome.params_updated,
                        "cycle complete"
                    );
                    if settings.max_cycles.is_some_and(|max| completed >= max) {
                        break;
                    }
                    sleep_unless_stopped(settings.cycle, stop);
                }
                Err(e) => {
                    warn!(error = %e, backoff = ?settings.retry_backoff, "strategy cycle failed");
                    notify_best_effort(
                        self.notifier.as_ref(),
                        &format!("{} strategy error: {e}", self.market.symbol),
                    );
                    sleep_unless_stopped(settings.retry_backoff, stop);
                }
            }
        }
        info!(cycles = completed, "strategy loop stopped");
        completed
    }

    /// Drain the update channel and apply the newest update, if any.
    fn adopt_pending_update(&mut self) -> bool {
        let mut latest = None;
        loop {
            match self.updates.try_recv() {
                Ok(update) => latest = Some(update),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        let Some(update) = latest else {
            return false;
        };

        let state = *self.automaton.state();
        let in_sell = state.in_sell_period || update.in_sell_period;
        let in_buy = state.in_buy_period || update.in_buy_period;
        self.automaton.replace_params(update.params);
        self.automaton.set_period_flags(in_sell, in_buy);
        info!(params = %update.params, delta = update.delta, "adopted new parameters");
        notify_best_effort(
            self.notifier.as_ref(),
            &format!("{} parameters updated: {}", self.market.symbol, update.params),
        );
        true
    }

    fn dispatch(&self, event: &AutomatonEvent) -> Dispatch {
        let symbol = &self.market.symbol;
        match event {
            AutomatonEvent::SellPeriodEntered { timestamp } => {
                notify_best_effort(
                    self.notifier.as_ref(),
                    &format!("{symbol} sell period entered at {timestamp}"),
                );
                Dispatch::Done
            }
            AutomatonEvent::BuyPeriodEntered { timestamp } => {
                notify_best_effort(
                    self.notifier.as_ref(),
                    &format!("{symbol} buy period entered at {timestamp}"),
                );
                Dispatch::Done
            }
            AutomatonEvent::Filled(fill) => self.execute(fill),
        }
    }

    /// Place the order, then record it. Nothing is recorded for a rejected
    /// order.
    fn execute(&self, fill: &Fill) -> Dispatch {
        let symbol = &self.market.symbol;
        info!(
            side = %fill.side,
            reason = ?fill.reason,
            price = fill.price,
            portion = fill.portion,
            "fill"
        );
        notify_best_effort(
            self.notifier.as_ref(),
            &format!(
                "{symbol} {} {:.2}% at {:.4} ({:?})",
                fill.side,
                fill.portion * 100.0,
                fill.price,
                fill.reason
            ),
        );

        let order = MarketOrder {
            side: fill.side,
            base: symbol.clone(),
            quote: self.market.quote.clone(),
            portion: fill.portion,
            reference_price: fill.price,
        };
        if let Err(e) = self.executor.place_market_order(&order) {
            warn!(error = %e, side = %fill.side, "order failed");
            notify_best_effort(self.notifier.as_ref(), &format!("{symbol} order failed: {e}"));
            return Dispatch::OrderFailed;
        }

        let Some(ledger) = &self.ledger else {
            return Dispatch::Done;
        };
        let entry = LedgerEntry {
            timestamp: fill.timestamp,
            price: fill.price,
            side: fill.side,
        };
        match ledger.append(&entry) {
            Ok(()) => Dispatch::Done,
            Err(e) => {
                warn!(error = %e, path = %ledger.path().display(), "ledger write failed");
                Dispatch::LedgerFailed
            }
        }
    }
}
