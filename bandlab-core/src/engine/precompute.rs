//! Indicator precomputation and alignment.
//!
//! RSI and Bollinger are computed once over the HL2 series. RSI is defined from
//! source bar `rsi_period - 1`, Bollinger from `bb_period - 1`; since
//! `bb_period >= rsi_period` the common window starts at `bb_period - 1` and
//! the RSI vector is read from offset `bb_period - rsi_period`.


use crate::domain::{ParameterSet, PriceSeries};
use crate::indicators::{bollinger_bands, rsi};
use crate::signal::BarSnapshot;

use super::BacktestError;

/// Per-bar snapshots for the window where every indicator is defined.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrame {
    /// Source index of the first snapshot.
    offset: usize,
    snapshots: Vec<BarSnapshot>,
}

impl AlignedFrame {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn snapshots(&self) -> &[BarSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn first(&self) -> Option<&BarSnapshot> {
        self.snapshots.first()
    }

    pub fn last(&self) -> Option<&BarSnapshot> {
        self.snapshots.last()
    }
}

/// Validate `params` and build the aligned frame for `series`.
///
/// The source series is only borrowed; nothing is written back to it.
pub fn precompute_frame(
    series: &PriceSeries,
    params: &ParameterSet,
) -> Result<AlignedFrame, BacktestError> {
    params.validate()?;

    let hl2 = series.hl2();
    let rsi_values = rsi(&hl2, params.rsi_period);
    let bands = bollinger_bands(&hl2, params.bb_period, params.bb_level);
    if rsi_values.is_empty() || bands.is_empty() {
        return Err(BacktestError::InsufficientData {
            required: params.bb_period.max(params.rsi_period + 1),
            available: series.len(),
        });
    }

    let offset = params.bb_period - 1;
    let rsi_offset = params.bb_period - params.rsi_period;
    let snapshots = series.bars()[offset..]
        .iter()
        .enumerate()
        .map(|(k, bar)| BarSnapshot {
            timestamp: bar.timestamp,
            price: bar.hl2(),
            high: bar.high,
            low: bar.low,
            rsi: rsi_values[rsi_offset + k],
            bb_upper: bands.upper[k],
            bb_middle: bands.middle[k],
            bb_lower: bands.lower[k],
        })
        .collect();

    Ok(AlignedFrame { offset, snapshots })
}
