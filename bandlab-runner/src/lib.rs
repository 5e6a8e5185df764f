//! BandLab Runner: orchestration around `bandlab-core`.
//!
//! This crate provides:
//! - TOML configuration
//! - Market-data feeds (CSV files, seeded synthetic series)
//! - The parameter sweeper and parallel sweep branches
//! - The append-only trade ledger
//! - Markdown reports
//! - The live strategy loop with its re-optimization worker

pub mod config;
pub mod data_loader;
pub mod ledger;
pub mod live;
pub mod reporting;
pub mod sweep;

pub use config::{BandLabConfig, BotConfig, ConfigError, FeedKind, MarketConfig, SweepConfig};
pub use data_loader::{
    dataset_hash, resample, CsvFeed, FeedError, MarketData, SineFeed, SyntheticFeed,
};
pub use ledger::{LedgerEntry, LedgerError, TradeLedger};
pub use live::{
    LiveTrader, LoopSettings, MarketSpec, OrderExecutor, ParameterUpdate, PaperBroker,
    ReOptimizer,
};
pub use reporting::{backtest_markdown, sweep_markdown, IndicatorSummary};
pub use sweep::{
    sweep_branches, ParamGrid, ParameterSweeper, SweepBranch, SweepEntry, SweepError,
    SweepReport, KEEP_PER_BUCKET,
};
