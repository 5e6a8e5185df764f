//! Market-data boundary: the `MarketData` trait and its feeds.
//!
//! Feeds always hand back bars in ascending time order; nothing downstream
//! reorders. Available feeds:
//! 1. `CsvFeed`: `{dir}/{SYMBOL}_{N}min.csv`, falling back to resampling the
//!    one-minute file when the requested interval has no file of its own
//! 2. `SyntheticFeed`: seeded random walk, deterministic per symbol
//! 3. `SineFeed`: a clean sinusoid with known peaks and troughs
//!
//! Synthetic data is for offline runs and tests only.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use bandlab_core::domain::{Bar, Interval, OutputSize, PriceSeries, SeriesError};

/// Timestamp layout used by CSV feeds and the trade ledger.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors from the market-data layer.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no data file for '{symbol}' at {path}")]
    MissingFile { symbol: String, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("bad timestamp '{value}' in {path}")]
    BadTimestamp { path: PathBuf, value: String },

    #[error("malformed bar at {timestamp} in {path}")]
    MalformedBar {
        path: PathBuf,
        timestamp: NaiveDateTime,
    },

    #[error("feed returned no bars for '{0}'")]
    Empty(String),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("feed unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous market-data fetch. Implementations return a complete series
/// before any simulation starts.
pub trait MarketData: Send + Sync {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        size: OutputSize,
    ) -> Result<PriceSeries, FeedError>;
}

/// Keep only the most recent bars allowed by `size`.
fn limit(series: PriceSeries, size: OutputSize) -> PriceSeries {
    match size.bar_limit() {
        Some(n) if series.len() > n => series.tail(n),
        _ => series,
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ── CSV feed ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Reads `timestamp,open,high,low,close[,volume]` files from a directory.
#[derive(Debug, Clone)]
pub struct CsvFeed {
    dir: PathBuf,
}

impl CsvFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.dir.join(format!("{}_{}.csv", symbol.to_uppercase(), interval))
    }

    fn read_file(&self, symbol: &str, path: &Path) -> Result<PriceSeries, FeedError> {
        let file = File::open(path).map_err(|_| FeedError::MissingFile {
            symbol: symbol.to_string(),
            path: path.to_path_buf(),
        })?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|source| FeedError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let timestamp =
                parse_timestamp(&row.timestamp).ok_or_else(|| FeedError::BadTimestamp {
                    path: path.to_path_buf(),
                    value: row.timestamp.clone(),
                })?;
            let bar = Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            };
            if !bar.is_sane() {
                return Err(FeedError::MalformedBar {
                    path: path.to_path_buf(),
                    timestamp,
                });
            }
            bars.push(bar);
        }
        if bars.is_empty() {
            return Err(FeedError::Empty(symbol.to_string()));
        }

        // exchange exports are often newest-first
        bars.sort_by_key(|b| b.timestamp);
        Ok(PriceSeries::new(symbol.to_uppercase(), bars)?)
    }
}

impl MarketData for CsvFeed {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        size: OutputSize,
    ) -> Result<PriceSeries, FeedError> {
        let path = self.path_for(symbol, interval);
        let series = if path.exists() || interval == Interval::OneMinute {
            self.read_file(symbol, &path)?
        } else {
            let base = self.path_for(symbol, Interval::OneMinute);
            debug!(path = %path.display(), base = %base.display(), "resampling from 1min file");
            resample(&self.read_file(symbol, &base)?, interval)?
        };
        info!(symbol, %interval, bars = series.len(), "loaded bars from csv");
        Ok(limit(series, size))
    }
}

/// Aggregate bars into `interval`-wide buckets aligned to the start of the day.
///
/// Open is the first open, close the last close, high/low the extremes.
/// Volume is summed when every bar in the bucket has one.
pub fn resample(series: &PriceSeries, interval: Interval) -> Result<PriceSeries, SeriesError> {
    let width = i64::from(interval.minutes());
    let bucket_start = |ts: NaiveDateTime| {
        let minute_of_day = i64::from(ts.hour()) * 60 + i64::from(ts.minute());
        let offset = minute_of_day % width;
        ts - Duration::minutes(offset) - Duration::seconds(i64::from(ts.second()))
            - Duration::nanoseconds(i64::from(ts.nanosecond()))
    };

    let mut out: Vec<Bar> = Vec::new();
    for bar in series.bars() {
        let start = bucket_start(bar.timestamp);
        match out.last_mut() {
            Some(last) if last.timestamp == start => {
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume = match (last.volume, bar.volume) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                };
            }
            _ => out.push(Bar {
                timestamp: start,
                ..bar.clone()
            }),
        }
    }
    PriceSeries::new(series.symbol(), out)
}

// ── Synthetic feeds ──────────────────────────────────────────────────

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Deterministic random walk seeded from the symbol name.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    start: NaiveDateTime,
    full_len: usize,
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self {
            start: default_start(),
            full_len: 2_000,
        }
    }
}

impl SyntheticFeed {
    pub fn new(start: NaiveDateTime, full_len: usize) -> Self {
        Self { start, full_len }
    }
}

impl MarketData for SyntheticFeed {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        size: OutputSize,
    ) -> Result<PriceSeries, FeedError> {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        // Deterministic seed from symbol name
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let n = size.bar_limit().unwrap_or(self.full_len);
        let step = interval.duration();
        let mut price = 100.0_f64;
        let bars = (0..n)
            .map(|i| {
                let ret: f64 = rng.gen_range(-0.01..0.01);
                let open = price;
                let close = price * (1.0 + ret);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.004));
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.004));
                let volume = rng.gen_range(10.0..1_000.0);
                price = close;
                Bar {
                    timestamp: self.start + step * i as i32,
                    open,
                    high,
                    low,
                    close,
                    volume: Some(volume),
                }
            })
            .collect();
        Ok(PriceSeries::new(symbol.to_uppercase(), bars)?)
    }
}

/// Sinusoidal HL2 with a fixed spread around it.
#[derive(Debug, Clone)]
pub struct SineFeed {
    pub start: NaiveDateTime,
    pub base: f64,
    pub amplitude: f64,
    /// Bars per full cycle.
    pub period_bars: f64,
    pub spread: f64,
    pub full_len: usize,
}

impl Default for SineFeed {
    fn default() -> Self {
        Self {
            start: default_start(),
            base: 100.0,
            amplitude: 10.0,
            period_bars: 24.0,
            spread: 0.5,
            full_len: 500,
        }
    }
}

impl MarketData for SineFeed {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        size: OutputSize,
    ) -> Result<PriceSeries, FeedError> {
        let n = size.bar_limit().unwrap_or(self.full_len);
        let step = interval.duration();
        let bars = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * i as f64 / self.period_bars;
                let mid = self.base + self.amplitude * phase.sin();
                Bar {
                    timestamp: self.start + step * i as i32,
                    open: mid,
                    high: mid + self.spread,
                    low: mid - self.spread,
                    close: mid,
                    volume: None,
                }
            })
            .collect();
        Ok(PriceSeries::new(symbol.to_uppercase(), bars)?)
    }
}

/// Compute a deterministic BLAKE3 hash over a price series.
///
/// Covers the symbol, every timestamp and every OHLCV value in order.
pub fn dataset_hash(series: &PriceSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.symbol().as_bytes());
    for bar in series.bars() {
        hasher.update(bar.timestamp.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.unwrap_or(f64::NAN).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn csv_feed_sorts_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("timestamp,open,high,low,close,volume\n");
        for i in (0..150).rev() {
            let ts = default_start() + Duration::minutes(5 * i);
            body.push_str(&format!(
                "{},{p},{h},{l},{p},10\n",
                ts.format(TIMESTAMP_FORMAT),
                p = 100.0 + i as f64,
                h = 101.0 + i as f64,
                l = 99.0 + i as f64,
            ));
        }
        write_csv(dir.path(), "BTC_5min.csv", &body);

        let feed = CsvFeed::new(dir.path());
        let compact = feed
            .fetch_bars("btc", Interval::FiveMinutes, OutputSize::Compact)
            .unwrap();
        assert_eq!(compact.len(), 100);
        assert_eq!(compact.symbol(), "BTC");
        assert_eq!(compact.bars()[99].close, 249.0);

        let full = feed
            .fetch_bars("BTC", Interval::FiveMinutes, OutputSize::Full)
            .unwrap();
        assert_eq!(full.len(), 150);
        assert!(full.bars().windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn malformed_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "ETH_5min.csv",
            "timestamp,open,high,low,close\n\
             2024-01-02 00:00:00,100,101,99,100\n\
             2024-01-02 00:05:00,100,98,99,100\n",
        );
        let err = CsvFeed::new(dir.path())
            .fetch_bars("ETH", Interval::FiveMinutes, OutputSize::Full)
            .unwrap_err();
        assert!(matches!(err, FeedError::MalformedBar { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvFeed::new(dir.path())
            .fetch_bars("ETH", Interval::OneHour, OutputSize::Full)
            .unwrap_err();
        assert!(matches!(err, FeedError::MissingFile { .. }));
    }

    #[test]
    fn missing_interval_is_resampled_from_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("timestamp,open,high,low,close\n");
        for i in 0..30 {
            let ts = default_start() + Duration::minutes(i);
            let p = 100.0 + i as f64;
            body.push_str(&format!("{},{p},{},{},{p}\n", ts.format(TIMESTAMP_FORMAT), p + 0.5, p - 0.5));
        }
        write_csv(dir.path(), "SOL_1min.csv", &body);

        let series = CsvFeed::new(dir.path())
            .fetch_bars("SOL", Interval::FifteenMinutes, OutputSize::Full)
            .unwrap();
        assert_eq!(series.len(), 2);
        let first = &series.bars()[0];
        assert_eq!(first.open, 100.0);
        assert_eq!(first.close, 114.0);
        assert_eq!(first.high, 114.5);
        assert_eq!(first.low, 99.5);
        assert_eq!(first.volume, None);
    }

    #[test]
    fn synthetic_feed_is_deterministic_per_symbol() {
        let feed = SyntheticFeed::default();
        let a = feed.fetch_bars("BTC", Interval::FiveMinutes, OutputSize::Full).unwrap();
        let b = feed.fetch_bars("BTC", Interval::FiveMinutes, OutputSize::Full).unwrap();
        let c = feed.fetch_bars("ETH", Interval::FiveMinutes, OutputSize::Full).unwrap();
        assert_eq!(a.len(), 2_000);
        assert_eq!(dataset_hash(&a), dataset_hash(&b));
        assert_ne!(dataset_hash(&a), dataset_hash(&c));
        assert!(a.bars().iter().all(|bar| bar.high >= bar.low && bar.low > 0.0));
    }

    #[test]
    fn sine_feed_peaks_where_expected() {
        let feed = SineFeed::default();
        let series = feed.fetch_bars("SINE", Interval::OneHour, OutputSize::Compact).unwrap();
        assert_eq!(series.len(), 100);
        let hl2 = series.hl2();
        // quarter cycle of a 24-bar period
        assert!((hl2[6] - 110.0).abs() < 1e-9);
        assert!((hl2[18] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn timestamps_accept_common_layouts() {
        assert!(parse_timestamp("2024-01-02 03:04:05").is_some());
        assert!(parse_timestamp("2024-01-02T03:04:05").is_some());
        assert!(parse_timestamp("2024-01-02").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
