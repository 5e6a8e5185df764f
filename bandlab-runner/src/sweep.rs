//! Parameter sweep: grid enumeration, admission rule and ranking.
//!
//! Traversal order is fixed: RSI period (as configured), then RSI upper bound
//! descending, RSI lower bound ascending, BB period ascending (only periods
//! >= the RSI period), BB level ascending.
//!
//! Admission: within one RSI-period bucket a result is kept only when its
//! delta is strictly positive and at least the best delta admitted so far in
//! that bucket; ties append. When a bucket completes, its list is reversed
//! and cut to `keep_per_bucket` entries (the latest admissions first). The
//! merged list is sorted by delta, descending, with a stable sort so equal
//! deltas keep admission order.
//!
//! Evaluation inside a bucket may run on the rayon pool; admission always
//! runs sequentially in traversal order, so parallel and sequential sweeps
//! return identical lists.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use bandlab_core::domain::{ParamError, ParameterSet, PriceSeries};
use bandlab_core::engine::{run_backtest, BacktestError, BacktestReport, EngineConfig};

use crate::data_loader::dataset_hash;

/// Entries kept per RSI-period bucket.
pub const KEEP_PER_BUCKET: usize = 3;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    InvalidParams(#[from] ParamError),

    #[error("invalid parameter set: sweep grid has no {0}")]
    EmptyGrid(&'static str),

    #[error("no adequate parameters found")]
    NoAdequateParameters,

    #[error("backtest failed for {params}: {source}")]
    Backtest {
        params: ParameterSet,
        #[source]
        source: BacktestError,
    },
}

/// Value lists to sweep. Portion and stop-loss portion are fixed per grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub rsi_periods: Vec<usize>,
    pub rsi_upper_bounds: Vec<f64>,
    pub rsi_lower_bounds: Vec<f64>,
    pub bb_periods: Vec<usize>,
    pub bb_levels: Vec<f64>,
    pub portion: f64,
    pub stop_loss_portion: f64,
}

impl Default for ParamGrid {
    /// The grid the live bot re-optimizes over.
    fn default() -> Self {
        Self {
            rsi_periods: (3..=10).collect(),
            rsi_upper_bounds: (0..=10).map(|i| 84.0 - 2.0 * i as f64).collect(),
            rsi_lower_bounds: (0..=10).map(|i| 16.0 + 2.0 * i as f64).collect(),
            bb_periods: (3..=17).collect(),
            bb_levels: (0..=6).map(|i| 1.75 + 0.25 * i as f64).collect(),
            portion: 0.95,
            stop_loss_portion: 0.0235,
        }
    }
}

impl ParamGrid {
    /// Number of leaf combinations, including ones filtered for `bb < rsi`.
    pub fn size(&self) -> usize {
        self.rsi_periods.len()
            * self.rsi_upper_bounds.len()
            * self.rsi_lower_bounds.len()
            * self.bb_periods.len()
            * self.bb_levels.len()
    }

    /// Fail fast on empty lists or any enumerated combination that would not
    /// validate.
    pub fn validate(&self) -> Result<(), SweepError> {
        let lists = [
            ("RSI periods", self.rsi_periods.is_empty()),
            ("RSI upper bounds", self.rsi_upper_bounds.is_empty()),
            ("RSI lower bounds", self.rsi_lower_bounds.is_empty()),
            ("BB periods", self.bb_periods.is_empty()),
            ("BB levels", self.bb_levels.is_empty()),
        ];
        if let Some((name, _)) = lists.iter().find(|(_, empty)| *empty) {
            return Err(SweepError::EmptyGrid(*name));
        }

        for &rsi_period in &self.rsi_periods {
            for params in self.bucket(rsi_period) {
                params.validate()?;
            }
        }
        Ok(())
    }

    /// Every combination for one RSI period, in traversal order.
    pub fn bucket(&self, rsi_period: usize) -> Vec<ParameterSet> {
        let mut uppers = self.rsi_upper_bounds.clone();
        uppers.sort_by(|a, b| b.total_cmp(a));
        let mut lowers = self.rsi_lower_bounds.clone();
        lowers.sort_by(f64::total_cmp);
        let mut bb_periods: Vec<usize> = self
            .bb_periods
            .iter()
            .copied()
            .filter(|&p| p >= rsi_period)
            .collect();
        bb_periods.sort_unstable();
        let mut levels = self.bb_levels.clone();
        levels.sort_by(f64::total_cmp);

        let mut out = Vec::with_capacity(uppers.len() * lowers.len() * bb_periods.len() * levels.len());
        for &rsi_upper_bound in &uppers {
            for &rsi_lower_bound in &lowers {
                for &bb_period in &bb_periods {
                    for &bb_level in &levels {
                        out.push(ParameterSet {
                            rsi_period,
                            rsi_upper_bound,
                            rsi_lower_bound,
                            bb_period,
                            bb_level,
                            portion: self.portion,
                            stop_loss_portion: self.stop_loss_portion,
                            stop_loss_enabled: true,
                        });
                    }
                }
            }
        }
        out
    }
}

/// One admitted result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub params: ParameterSet,
    pub wallet_end: f64,
    pub action_gain_loss: f64,
    pub no_action_gain_loss: f64,
    pub delta: f64,
    pub delta_per_day: Option<f64>,
    pub fill_count: usize,
    /// Open period flags at the end of the replay.
    pub ends_in_sell_period: bool,
    pub ends_in_buy_period: bool,
}

impl From<&BacktestReport> for SweepEntry {
    fn from(report: &BacktestReport) -> Self {
        Self {
            params: report.params,
            wallet_end: report.wallet_end,
            action_gain_loss: report.action_gain_loss,
            no_action_gain_loss: report.no_action_gain_loss,
            delta: report.delta,
            delta_per_day: report.delta_per_day,
            fill_count: report.fill_count,
            ends_in_sell_period: report.final_state.in_sell_period,
            ends_in_buy_period: report.final_state.in_buy_period,
        }
    }
}

/// Ranked outcome of one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub symbol: String,
    /// BLAKE3 fingerprint of the swept series.
    pub dataset_hash: String,
    pub bar_count: usize,
    pub evaluated: usize,
    /// Combinations skipped for lack of data.
    pub skipped: usize,
    /// Sorted by delta, best first. Never empty.
    pub entries: Vec<SweepEntry>,
}

impl SweepReport {
    pub fn best(&self) -> Option<&SweepEntry> {
        self.entries.first()
    }
}

/// Parameter sweep executor.
#[derive(Debug, Clone)]
pub struct ParameterSweeper {
    grid: ParamGrid,
    parallel: bool,
    keep_per_bucket: usize,
}

impl ParameterSweeper {
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            parallel: true,
            keep_per_bucket: KEEP_PER_BUCKET,
        }
    }

    /// Enables or disables parallel evaluation within a bucket.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// Sweep the grid over `series`.
    ///
    /// The series is only read. Combinations that need more bars than the
    /// series has are skipped, not reported as errors.
    pub fn sweep(&self, series: &PriceSeries) -> Result<SweepReport, SweepError> {
        self.grid.validate()?;
        let config = EngineConfig::for_sweep();

        let mut entries = Vec::new();
        let mut evaluated = 0usize;
        let mut skipped = 0usize;

        for &rsi_period in &self.grid.rsi_periods {
            let candidates = self.grid.bucket(rsi_period);
            let outcomes: Vec<Result<BacktestReport, BacktestError>> = if self.parallel {
                candidates
                    .par_iter()
                    .map(|params| run_backtest(series, params, &config))
                    .collect()
            } else {
                candidates
                    .iter()
                    .map(|params| run_backtest(series, params, &config))
                    .collect()
            };

            let mut reports = Vec::with_capacity(candidates.len());
            for (params, outcome) in candidates.iter().zip(outcomes) {
                match outcome {
                    Ok(report) => {
                        evaluated += 1;
                        reports.push(report);
                    }
                    Err(BacktestError::InsufficientData {
                        required,
                        available,
                    }) => {
                        skipped += 1;
                        debug!(params = %params, required, available, "skipping combination");
                    }
                    Err(source) => {
                        return Err(SweepError::Backtest {
                            params: *params,
                            source,
                        })
                    }
                }
            }

            let deltas: Vec<f64> = reports.iter().map(|r| r.delta).collect();
            let admitted: Vec<SweepEntry> = admit_bucket(&deltas, self.keep_per_bucket)
                .into_iter()
                .map(|i| SweepEntry::from(&reports[i]))
                .collect();
            let best_delta = admitted.first().map_or(0.0, |e| e.delta);
            info!(
                rsi_period,
                combinations = candidates.len(),
                admitted = admitted.len(),
                best_delta,
                "bucket complete"
            );
            entries.extend(admitted);
        }

        if entries.is_empty() {
            return Err(SweepError::NoAdequateParameters);
        }
        rank(&mut entries);

        Ok(SweepReport {
            symbol: series.symbol().to_string(),
            dataset_hash: dataset_hash(series),
            bar_count: series.len(),
            evaluated,
            skipped,
            entries,
        })
    }
}

/// Admission over one bucket's deltas, in traversal order.
///
/// Returns indices into `deltas`, latest admission first, at most `keep`
/// of them. A delta is admitted when it is positive and at least the best
/// admitted so far; the running best starts at zero for every bucket.
fn admit_bucket(deltas: &[f64], keep: usize) -> Vec<usize> {
    let mut best = 0.0_f64;
    let mut admitted = Vec::new();
    for (i, &delta) in deltas.iter().enumerate() {
        if delta > 0.0 && delta >= best {
            best = delta;
            admitted.push(i);
        }
    }
    admitted.reverse();
    admitted.truncate(keep);
    admitted
}

/// Best delta first; equal deltas keep their merged order.
fn rank(entries: &mut [SweepEntry]) {
    entries.sort_by(|a, b| b.delta.total_cmp(&a.delta));
}

/// One independent sweep: its own series copy and its own sweeper.
#[derive(Debug, Clone)]
pub struct SweepBranch {
    pub label: String,
    pub series: PriceSeries,
    pub sweeper: ParameterSweeper,
}

impl SweepBranch {
    /// One branch per trailing window length.
    pub fn by_tail(series: &PriceSeries, sweeper: &ParameterSweeper, tails: &[usize]) -> Vec<Self> {
        tails
            .iter()
            .map(|&n| SweepBranch {
                label: format!("tail={n}"),
                series: series.tail(n),
                sweeper: sweeper.clone(),
            })
            .collect()
    }

    /// One branch per stop-loss portion.
    pub fn by_stop_loss(
        series: &PriceSeries,
        sweeper: &ParameterSweeper,
        portions: &[f64],
    ) -> Vec<Self> {
        portions
            .iter()
            .map(|&stop_loss_portion| {
                let grid = ParamGrid {
                    stop_loss_portion,
                    ..sweeper.grid.clone()
                };
                SweepBranch {
                    label: format!("stop_loss={stop_loss_portion}"),
                    series: series.clone(),
                    sweeper: ParameterSweeper {
                        grid,
                        ..sweeper.clone()
                    },
                }
            })
            .collect()
    }
}

/// Run independent branches concurrently and collect every result in input order.
///
/// Branches share nothing; a failing branch does not stop the others.
pub fn sweep_branches(branches: Vec<SweepBranch>) -> Vec<(String, Result<SweepReport, SweepError>)> {
    branches
        .into_par_iter()
        .map(|branch| {
            let result = branch.sweeper.sweep(&branch.series);
            (branch.label, result)
        })
        .collect()
}
