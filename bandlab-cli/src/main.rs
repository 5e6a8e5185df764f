//! BandLab CLI: backtest, sweep, trade history and the paper-trading bot.
//!
//! Commands:
//! - `backtest`: replay one parameter set over a feed and print a report
//! - `sweep`: search the parameter grid, optionally across several branches
//! - `history`: print the trade ledger
//! - `bot`: run the live loop against a paper broker with periodic re-optimization

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bandlab_core::automaton::{Sizing, StrategyAutomaton, Wallet};
use bandlab_core::domain::{Interval, PriceSeries};
use bandlab_core::engine::{run_backtest, EngineConfig, START_USD};
use bandlab_runner::live::{LiveTrader, LogNotifier, PaperBroker, ReOptimizer};
use bandlab_runner::{
    backtest_markdown, sweep_branches, sweep_markdown, BandLabConfig, FeedKind, IndicatorSummary,
    SweepBranch, SweepError, TradeLedger,
};

#[derive(Parser)]
#[command(name = "bandlab", about = "BandLab: RSI + Bollinger Bands strategy lab")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the configured parameter set.
    Backtest {
        #[command(flatten)]
        common: CommonArgs,

        /// Position sizing. Defaults to the [bot] setting.
        #[arg(long, value_enum)]
        sizing: Option<SizingArg>,

        /// Print the report as JSON instead of markdown.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Sweep the configured parameter grid.
    Sweep {
        #[command(flatten)]
        common: CommonArgs,

        /// Run one branch per trailing window (e.g. --tails 100,250,500).
        #[arg(long, value_delimiter = ',')]
        tails: Vec<usize>,

        /// Run one branch per stop-loss portion (e.g. --stop-losses 0,0.0235).
        #[arg(long, value_delimiter = ',')]
        stop_losses: Vec<f64>,

        /// Print the report as JSON instead of markdown.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the trade ledger.
    History {
        /// Ledger file. Defaults to the [bot] setting.
        #[arg(long)]
        ledger: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the strategy loop against a paper broker.
    Bot {
        #[command(flatten)]
        common: CommonArgs,

        /// Stop after this many cycles.
        #[arg(long)]
        max_cycles: Option<u64>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    symbol: Option<String>,

    #[arg(long, value_enum)]
    feed: Option<FeedArg>,

    /// Directory holding `{SYMBOL}_{N}min.csv` files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Candle width in minutes: 1, 5, 15, 30 or 60.
    #[arg(long, value_parser = parse_interval)]
    interval: Option<Interval>,

    /// Use only the last N bars.
    #[arg(long)]
    tail: Option<usize>,

    #[command(flatten)]
    params: ParamArgs,
}

/// Overrides for the `[params]` section. Portion and stop-loss portion also
/// apply to the sweep grid.
#[derive(Args)]
struct ParamArgs {
    #[arg(long)]
    rsi_period: Option<usize>,

    #[arg(long)]
    rsi_upper: Option<f64>,

    #[arg(long)]
    rsi_lower: Option<f64>,

    #[arg(long)]
    bb_period: Option<usize>,

    #[arg(long)]
    bb_level: Option<f64>,

    #[arg(long)]
    portion: Option<f64>,

    /// Stop-loss distance as a fraction of price; 0 trails the bar's own range.
    #[arg(long)]
    stop_loss: Option<f64>,

    /// Run the backtest or bot without the stop-loss sub-automaton.
    #[arg(long, default_value_t = false, conflicts_with = "stop_loss")]
    no_stop_loss: bool,
}

impl ParamArgs {
    fn apply(&self, config: &mut BandLabConfig) {
        let params = &mut config.params;
        if let Some(v) = self.rsi_period {
            params.rsi_period = v;
        }
        if let Some(v) = self.rsi_upper {
            params.rsi_upper_bound = v;
        }
        if let Some(v) = self.rsi_lower {
            params.rsi_lower_bound = v;
        }
        if let Some(v) = self.bb_period {
            params.bb_period = v;
        }
        if let Some(v) = self.bb_level {
            params.bb_level = v;
        }
        if let Some(v) = self.portion {
            params.portion = v;
            config.sweep.portion = v;
        }
        if let Some(v) = self.stop_loss {
            params.stop_loss_portion = v;
            config.sweep.stop_loss_portion = v;
        }
        if self.no_stop_loss {
            params.stop_loss_enabled = false;
        }
    }
}

fn parse_interval(raw: &str) -> Result<Interval, String> {
    let minutes: u32 = raw
        .trim_end_matches("min")
        .parse()
        .map_err(|e| format!("bad interval '{raw}': {e}"))?;
    Interval::try_from(minutes)
}

#[derive(Clone, Copy, ValueEnum)]
enum FeedArg {
    Csv,
    Synthetic,
    Sine,
}

impl From<FeedArg> for FeedKind {
    fn from(arg: FeedArg) -> Self {
        match arg {
            FeedArg::Csv => FeedKind::Csv,
            FeedArg::Synthetic => FeedKind::Synthetic,
            FeedArg::Sine => FeedKind::Sine,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SizingArg {
    Fixed,
    Graduated,
}

impl From<SizingArg> for Sizing {
    fn from(arg: SizingArg) -> Self {
        match arg {
            SizingArg::Fixed => Sizing::Fixed,
            SizingArg::Graduated => Sizing::Graduated,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Backtest {
            common,
            sizing,
            json,
        } => run_backtest_cmd(&common, sizing, json),
        Commands::Sweep {
            common,
            tails,
            stop_losses,
            json,
        } => run_sweep_cmd(&common, &tails, &stop_losses, json),
        Commands::History { ledger, config } => run_history_cmd(ledger, config.as_deref()),
        Commands::Bot { common, max_cycles } => run_bot_cmd(&common, max_cycles),
    }
}

/// Load the config file (or defaults) and apply command-line overrides.
fn load_config(common: &CommonArgs) -> Result<BandLabConfig> {
    let mut config = match &common.config {
        Some(path) => BandLabConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BandLabConfig::default(),
    };
    if let Some(symbol) = &common.symbol {
        config.market.symbol = symbol.clone();
    }
    if let Some(feed) = common.feed {
        config.market.feed = feed.into();
    }
    if let Some(dir) = &common.data_dir {
        config.market.data_dir = dir.clone();
    }
    if let Some(interval) = common.interval {
        config.market.interval = interval;
    }
    if common.tail.is_some() {
        config.sweep.tail = common.tail;
    }
    common.params.apply(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn fetch(config: &BandLabConfig, tail: Option<usize>) -> Result<PriceSeries> {
    let market = &config.market;
    let series = market
        .build_feed()
        .fetch_bars(&market.symbol, market.interval, market.size)
        .with_context(|| format!("fetching {} {} bars", market.symbol, market.interval))?;
    Ok(match tail {
        Some(n) if series.len() > n => series.tail(n),
        _ => series,
    })
}

fn run_backtest_cmd(common: &CommonArgs, sizing: Option<SizingArg>, json: bool) -> Result<()> {
    let config = load_config(common)?;
    let series = fetch(&config, common.tail)?;
    let engine = EngineConfig {
        sizing: sizing.map_or(config.bot.sizing, Sizing::from),
        record_events: true,
    };
    let report = run_backtest(&series, &config.params, &engine)
        .with_context(|| format!("backtesting {}", config.params))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let indicators = IndicatorSummary::from_series(&series);
        print!("{}", backtest_markdown(&report, &indicators));
    }
    Ok(())
}

fn run_sweep_cmd(common: &CommonArgs, tails: &[usize], stop_losses: &[f64], json: bool) -> Result<()> {
    let config = load_config(common)?;
    let sweeper = config.sweep.sweeper();

    if tails.is_empty() && stop_losses.is_empty() {
        let series = fetch(&config, config.sweep.tail)?;
        info!(
            symbol = %series.symbol(),
            bars = series.len(),
            combinations = sweeper.grid().size(),
            "starting sweep"
        );
        let report = sweeper.sweep(&series).context("sweep failed")?;
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", sweep_markdown(&report));
        }
        return Ok(());
    }

    if !tails.is_empty() && !stop_losses.is_empty() {
        bail!("--tails and --stop-losses are mutually exclusive");
    }
    let series = fetch(&config, None)?;
    let branches = if tails.is_empty() {
        let series = match config.sweep.tail {
            Some(n) if series.len() > n => series.tail(n),
            _ => series,
        };
        SweepBranch::by_stop_loss(&series, &sweeper, stop_losses)
    } else {
        SweepBranch::by_tail(&series, &sweeper, tails)
    };

    for (label, outcome) in sweep_branches(branches) {
        match outcome {
            Ok(report) if json => {
                println!("{}", serde_json::json!({ "branch": label, "report": report }));
            }
            Ok(report) => {
                println!("## Branch {label}\n");
                print!("{}", sweep_markdown(&report));
                println!();
            }
            Err(SweepError::NoAdequateParameters) => {
                println!("## Branch {label}\n\nno adequate parameters found\n");
            }
            Err(e) => return Err(e).with_context(|| format!("branch {label}")),
        }
    }
    Ok(())
}

fn run_history_cmd(ledger: Option<PathBuf>, config: Option<&Path>) -> Result<()> {
    let path = match (ledger, config) {
        (Some(path), _) => path,
        (None, Some(config)) => {
            BandLabConfig::from_file(config)
                .with_context(|| format!("loading {}", config.display()))?
                .bot
                .ledger_path
        }
        (None, None) => BandLabConfig::default().bot.ledger_path,
    };

    let history = TradeLedger::new(&path)
        .read_history()
        .with_context(|| format!("reading {}", path.display()))?;
    if history.is_empty() {
        println!("No orders recorded in {}", path.display());
        return Ok(());
    }
    println!("{:<20} {:>14} {:>5}", "time", "price", "side");
    for entry in &history {
        println!("{:<20} {:>14.4} {:>5}", entry.timestamp, entry.price, entry.side);
    }
    println!("{} orders", history.len());
    Ok(())
}

fn run_bot_cmd(common: &CommonArgs, max_cycles: Option<u64>) -> Result<()> {
    let mut config = load_config(common)?;
    if max_cycles.is_some() {
        config.bot.max_cycles = max_cycles;
    }

    let feed = config.market.build_feed();
    let market = config.market.market_spec(&config.bot.quote);
    let opening = fetch(&config, None)?;
    let price = opening
        .bars()
        .last()
        .map(|bar| bar.hl2())
        .context("feed returned no bars")?;
    let wallet = Wallet::new(START_USD, START_USD / price);
    info!(symbol = %market.symbol, price, params = %config.params, "starting bot");

    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    let optimizer = ReOptimizer::new(
        Arc::clone(&feed),
        market.clone(),
        config.sweep.sweeper(),
        config.sweep.tail,
        config.bot.reoptimize_interval(),
    );
    let worker = optimizer
        .spawn(tx, Arc::clone(&stop))
        .context("spawning optimizer thread")?;

    let automaton = StrategyAutomaton::new(config.params, config.bot.sizing, wallet);
    let mut trader = LiveTrader::new(
        market,
        feed,
        Box::new(PaperBroker::new(wallet)),
        Box::new(LogNotifier),
        automaton,
        rx,
    )
    .with_ledger(TradeLedger::new(&config.bot.ledger_path));

    let cycles = trader.run(&config.bot.loop_settings(), &stop);
    stop.store(true, Ordering::Relaxed);
    if worker.join().is_err() {
        bail!("optimizer thread panicked");
    }

    let state = trader.automaton().state();
    info!(
        cycles,
        usd = state.wallet.usd,
        asset = state.wallet.asset,
        "bot stopped"
    );
    Ok(())
}
