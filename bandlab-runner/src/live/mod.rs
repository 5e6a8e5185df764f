//! Live trading: the strategy loop, its re-optimization worker and the
//! broker/notification boundaries it talks to.
//!
//! The optimizer thread sends `ParameterUpdate`s over an `mpsc` channel; the
//! trader only reads that channel at the start of a cycle, so parameters never
//! change while a bar is being processed.

pub mod broker;
pub mod notify;
pub mod optimizer;
pub mod trader;

pub use broker::{MarketOrder, OrderError, OrderExecutor, OrderReport, OrderStatus, PaperBroker};
pub use notify::{notify_best_effort, LogNotifier, MemoryNotifier, Notifier, NotifyError};
pub use optimizer::{OptimizerError, ReOptimizer};
pub use trader::{CycleOutcome, LiveTrader, LoopSettings, TraderError};

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use bandlab_core::domain::{Interval, OutputSize, ParameterSet};

use crate::sweep::SweepEntry;

/// Which market a live loop watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSpec {
    pub symbol: String,
    pub quote: String,
    pub interval: Interval,
    pub size: OutputSize,
}

/// Winning parameters from one re-optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub params: ParameterSet,
    /// Period flags the winning replay ended with.
    pub in_sell_period: bool,
    pub in_buy_period: bool,
    pub delta: f64,
}

impl From<&SweepEntry> for ParameterUpdate {
    fn from(entry: &SweepEntry) -> Self {
        Self {
            params: entry.params,
            in_sell_period: entry.ends_in_sell_period,
            in_buy_period: entry.ends_in_buy_period,
            delta: entry.delta,
        }
    }
}

/// Sleep for `total`, waking early once `stop` is set.
pub(crate) fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let slice = Duration::from_millis(100);
    let mut left = total;
    while !left.is_zero() && !stop.load(Ordering::Relaxed) {
        let nap = left.min(slice);
        thread::sleep(nap);
        left -= nap;
    }
}
