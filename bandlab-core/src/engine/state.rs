//! Engine configuration, errors and run report.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::automaton::{AutomatonError, AutomatonEvent, AutomatonState, Fill, Sizing};
use crate::domain::{ParamError, ParameterSet};

/// USD balance a backtest starts with. The asset side starts at the same value.
pub const START_USD: f64 = 100.0;
/// Total starting wallet value at the first aligned price.
pub const WALLET_START: f64 = 2.0 * START_USD;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error(transparent)]
    InvalidParams(#[from] ParamError),

    #[error("insufficient data: need at least {required} bars, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("automaton rejected bar: {0}")]
    Automaton(#[from] AutomatonError),
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sizing: Sizing,
    /// Keep every automaton event in the report. Sweeps turn this off.
    pub record_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sizing: Sizing::Fixed,
            record_events: true,
        }
    }
}

impl EngineConfig {
    pub fn for_sweep() -> Self {
        Self {
            sizing: Sizing::Fixed,
            record_events: false,
        }
    }
}

/// Outcome of replaying one parameter set over one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub params: ParameterSet,
    pub sizing: Sizing,
    /// Aligned bars replayed.
    pub bar_count: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub first_price: f64,
    pub last_price: f64,
    pub wallet_start: f64,
    pub wallet_end: f64,
    pub action_gain_loss: f64,
    pub no_action_gain_loss: f64,
    pub delta: f64,
    pub days_covered: f64,
    /// `delta / days_covered`; None when the window spans no time.
    pub delta_per_day: Option<f64>,
    /// Settled fills, counted even when events are not recorded.
    pub fill_count: usize,
    /// State after the last bar, including open period flags.
    pub final_state: AutomatonState,
    pub events: Vec<AutomatonEvent>,
}

impl BacktestReport {
    pub fn fills(&self) -> impl Iterator<Item = &Fill> {
        self.events.iter().filter_map(AutomatonEvent::fill)
    }
}
