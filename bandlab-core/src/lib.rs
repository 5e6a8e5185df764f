//! BandLab Core: indicators, signal classification, the strategy automaton and
//! the backtest engine for an RSI + Bollinger Bands strategy with trailing
//! stop-loss.
//!
//! This crate performs no I/O:
//! - Domain types (bars, price series, parameter sets)
//! - Pure indicator functions over HL2 series
//! - Per-bar SELL/BUY/HOLD classification
//! - Sell, buy and stop-loss sub-automata over one simulated wallet
//! - Deterministic single-parameter backtests

pub mod automaton;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signal;

pub use automaton::{AutomatonError, AutomatonEvent, Sizing, StrategyAutomaton};
pub use domain::{Bar, Interval, OutputSize, ParamError, ParameterSet, PriceSeries};
pub use engine::{run_backtest, BacktestError, BacktestReport, EngineConfig};
pub use signal::{BarSignals, BarSnapshot, Signal};
