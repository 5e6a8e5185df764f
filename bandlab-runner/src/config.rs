//! TOML configuration.
//!
//! ```toml
//! [market]
//! symbol = "BTC"
//! interval = 5
//! size = "full"
//! data_dir = "data"
//! feed = "csv"
//!
//! [params]
//! rsi_period = 4
//! bb_period = 4
//!
//! [sweep]
//! rsi_periods = [3, 4, 5]
//! tail = 250
//!
//! [bot]
//! cycle_secs = 60
//! sizing = "graduated"
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandlab_core::automaton::Sizing;
use bandlab_core::domain::{Interval, OutputSize, ParamError, ParameterSet};

use crate::data_loader::{CsvFeed, MarketData, SineFeed, SyntheticFeed};
use crate::live::{LoopSettings, MarketSpec};
use crate::sweep::{ParamGrid, ParameterSweeper, SweepError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid [params]: {0}")]
    InvalidParams(#[from] ParamError),

    #[error("invalid [sweep]: {0}")]
    InvalidSweep(#[from] SweepError),

    #[error("invalid [bot]: {0}")]
    InvalidBot(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandLabConfig {
    pub market: MarketConfig,
    pub params: ParameterSet,
    pub sweep: SweepConfig,
    pub bot: BotConfig,
}

impl BandLabConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse and validate.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        self.sweep.grid().validate()?;
        if self.bot.cycle_secs == 0 {
            return Err(ConfigError::InvalidBot("cycle_secs must be positive".into()));
        }
        if self.bot.reoptimize_every == 0 {
            return Err(ConfigError::InvalidBot(
                "reoptimize_every must be at least 1".into(),
            ));
        }
        if self.sweep.tail == Some(0) {
            return Err(ConfigError::InvalidSweep(SweepError::EmptyGrid("bars in tail")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    #[default]
    Csv,
    Synthetic,
    Sine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub symbol: String,
    pub interval: Interval,
    pub size: OutputSize,
    pub data_dir: PathBuf,
    pub feed: FeedKind,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC".into(),
            interval: Interval::FiveMinutes,
            size: OutputSize::Full,
            data_dir: PathBuf::from("data"),
            feed: FeedKind::Csv,
        }
    }
}

impl MarketConfig {
    pub fn build_feed(&self) -> Arc<dyn MarketData> {
        match self.feed {
            FeedKind::Csv => Arc::new(CsvFeed::new(&self.data_dir)),
            FeedKind::Synthetic => Arc::new(SyntheticFeed::default()),
            FeedKind::Sine => Arc::new(SineFeed::default()),
        }
    }

    pub fn market_spec(&self, quote: &str) -> MarketSpec {
        MarketSpec {
            symbol: self.symbol.clone(),
            quote: quote.to_string(),
            interval: self.interval,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub rsi_periods: Vec<usize>,
    pub rsi_upper_bounds: Vec<f64>,
    pub rsi_lower_bounds: Vec<f64>,
    pub bb_periods: Vec<usize>,
    pub bb_levels: Vec<f64>,
    pub portion: f64,
    pub stop_loss_portion: f64,
    /// Sweep only the most recent N bars.
    pub tail: Option<usize>,
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let grid = ParamGrid::default();
        Self {
            rsi_periods: grid.rsi_periods,
            rsi_upper_bounds: grid.rsi_upper_bounds,
            rsi_lower_bounds: grid.rsi_lower_bounds,
            bb_periods: grid.bb_periods,
            bb_levels: grid.bb_levels,
            portion: grid.portion,
            stop_loss_portion: grid.stop_loss_portion,
            tail: Some(250),
            parallel: true,
        }
    }
}

impl SweepConfig {
    pub fn grid(&self) -> ParamGrid {
        ParamGrid {
            rsi_periods: self.rsi_periods.clone(),
            rsi_upper_bounds: self.rsi_upper_bounds.clone(),
            rsi_lower_bounds: self.rsi_lower_bounds.clone(),
            bb_periods: self.bb_periods.clone(),
            bb_levels: self.bb_levels.clone(),
            portion: self.portion,
            stop_loss_portion: self.stop_loss_portion,
        }
    }

    pub fn sweeper(&self) -> ParameterSweeper {
        ParameterSweeper::new(self.grid()).with_parallelism(self.parallel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub cycle_secs: u64,
    /// Re-optimize once per this many cycles.
    pub reoptimize_every: u64,
    pub retry_backoff_secs: u64,
    pub ledger_path: PathBuf,
    pub sizing: Sizing,
    pub max_cycles: Option<u64>,
    pub quote: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            cycle_secs: 60,
            reoptimize_every: 30,
            retry_backoff_secs: 10,
            ledger_path: PathBuf::from("orders.csv"),
            sizing: Sizing::Graduated,
            max_cycles: None,
            quote: "USD".into(),
        }
    }
}

impl BotConfig {
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            cycle: Duration::from_secs(self.cycle_secs),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            max_cycles: self.max_cycles,
        }
    }

    /// Time between re-optimization passes.
    pub fn reoptimize_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_secs.saturating_mul(self.reoptimize_every))
    }
}
