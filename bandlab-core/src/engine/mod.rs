//! Backtesting engine: indicator precompute, bar alignment and the replay loop.
//!
//! A run has two stages:
//!
//! 1. Precompute: RSI and Bollinger over the HL2 series, cut to the window
//!    where both are defined (`AlignedFrame`).
//! 2. Replay: one `StrategyAutomaton` stepped over every aligned bar from a
//!    fresh wallet, then valued against buy-and-hold.

pub mod loop_runner;
pub mod precompute;
pub mod state;

pub use loop_runner::{run_backtest, run_frame};
pub use precompute::{precompute_frame, AlignedFrame};
pub use state::{BacktestError, BacktestReport, EngineConfig, START_USD, WALLET_START};
