//! Append-only trade ledger.
//!
//! One headerless CSV row per fill: `timestamp,price,side`, for example
//! `2024-05-06 10:35:00,101.25,sell`. Rows are never rewritten or removed.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandlab_core::automaton::Side;

use crate::data_loader::{parse_timestamp, TIMESTAMP_FORMAT};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed ledger row {row}: {reason}")]
    Malformed { row: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub side: Side,
}

#[derive(Debug, Clone)]
pub struct TradeLedger {
    path: PathBuf,
}

impl TradeLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file on first use.
    pub fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| LedgerError::Io {
                path: self.path.clone(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record([
            entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            entry.price.to_string(),
            entry.side.to_string(),
        ])?;
        writer.flush().map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Full order history in file order. A ledger that was never written is empty.
    pub fn read_history(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut entries = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = i + 1;
            let field = |idx: usize, name: &str| {
                record.get(idx).ok_or_else(|| LedgerError::Malformed {
                    row,
                    reason: format!("missing {name}"),
                })
            };

            let raw_ts = field(0, "timestamp")?;
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LedgerError::Malformed {
                row,
                reason: format!("bad timestamp '{raw_ts}'"),
            })?;
            let price = field(1, "price")?
                .parse::<f64>()
                .map_err(|e| LedgerError::Malformed {
                    row,
                    reason: format!("bad price: {e}"),
                })?;
            let side = field(2, "side")?
                .parse::<Side>()
                .map_err(|reason| LedgerError::Malformed { row, reason })?;

            entries.push(LedgerEntry {
                timestamp,
                price,
                side,
            });
        }
        Ok(entries)
    }
}
