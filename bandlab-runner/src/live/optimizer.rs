//! Periodic re-optimization worker.
//!
//! Runs on its own thread and talks to the strategy loop only through an
//! `mpsc` channel of `ParameterUpdate`s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::data_loader::{FeedError, MarketData};
use crate::sweep::{ParameterSweeper, SweepError};

use super::{sleep_unless_stopped, MarketSpec, ParameterUpdate};

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("market data: {0}")]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Sweep(#[from] SweepError),
}

pub struct ReOptimizer {
    feed: Arc<dyn MarketData>,
    market: MarketSpec,
    sweeper: ParameterSweeper,
    /// Sweep only the last N bars.
    tail: Option<usize>,
    every: Duration,
}

impl ReOptimizer {
    pub fn new(
        feed: Arc<dyn MarketData>,
        market: MarketSpec,
        sweeper: ParameterSweeper,
        tail: Option<usize>,
        every: Duration,
    ) -> Self {
        Self {
            feed,
            market,
            sweeper,
            tail,
            every,
        }
    }

    /// One fetch-and-sweep pass. `Ok(None)` when nothing beat buy-and-hold.
    pub fn run_once(&self) -> Result<Option<ParameterUpdate>, OptimizerError> {
        let series = self
            .feed
            .fetch_bars(&self.market.symbol, self.market.interval, self.market.size)?;
        let series = match self.tail {
            Some(n) if series.len() > n => series.tail(n),
            _ => series,
        };

        match self.sweeper.sweep(&series) {
            Ok(report) => Ok(report.best().map(ParameterUpdate::from)),
            Err(SweepError::NoAdequateParameters) => {
                info!(symbol = %self.market.symbol, "no adequate parameters found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Spawn the worker thread. It sweeps immediately, then every `every`,
    /// until `stop` is set or the receiving side hangs up.
    pub fn spawn(
        self,
        updates: Sender<ParameterUpdate>,
        stop: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("bandlab-optimizer".into())
            .spawn(move || self.worker_loop(&updates, &stop))
    }

    fn worker_loop(&self, updates: &Sender<ParameterUpdate>, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            match self.run_once() {
                Ok(Some(update)) => {
                    info!(params = %update.params, delta = update.delta, "sending parameter update");
                    if updates.send(update).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "re-optimization failed"),
            }
            sleep_unless_stopped(self.every, stop);
        }
        info!("optimizer stopped");
    }
}
