//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLC(V) candle for a single symbol over one interval.
///
/// Well-formedness is not enforced on construction; feeds reading external
/// data check `is_sane` before accepting a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl Bar {
    /// Midpoint of the bar's range, the reference price of the strategy.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// No NaN field, a positive low, and open/close inside [low, high].
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }
}

/// Candle width supported by the market-data boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
}

impl Interval {
    pub fn minutes(self) -> u32 {
        match self {
            Interval::OneMinute => 1,
            Interval::FiveMinutes => 5,
            Interval::FifteenMinutes => 15,
            Interval::ThirtyMinutes => 30,
            Interval::OneHour => 60,
        }
    }

    pub fn duration(self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.minutes()))
    }
}

impl TryFrom<u32> for Interval {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            1 => Ok(Interval::OneMinute),
            5 => Ok(Interval::FiveMinutes),
            15 => Ok(Interval::FifteenMinutes),
            30 => Ok(Interval::ThirtyMinutes),
            60 => Ok(Interval::OneHour),
            other => Err(format!(
                "unsupported interval {other}min (expected 1, 5, 15, 30 or 60)"
            )),
        }
    }
}

impl From<Interval> for u32 {
    fn from(interval: Interval) -> Self {
        interval.minutes()
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}min", self.minutes())
    }
}

/// How much history a fetch should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSize {
    /// The most recent ~100 bars.
    #[default]
    Compact,
    /// Everything the source has.
    Full,
}

impl OutputSize {
    pub const COMPACT_BARS: usize = 100;

    /// Maximum number of bars to keep, or `None` for no limit.
    pub fn bar_limit(self) -> Option<usize> {
        match self {
            OutputSize::Compact => Some(Self::COMPACT_BARS),
            OutputSize::Full => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: Some(50_000.0),
        }
    }

    #[test]
    fn hl2_is_range_midpoint() {
        assert_eq!(sample_bar().hl2(), 101.5);
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_without_volume_deserializes() {
        let json = r#"{"timestamp":"2024-01-02T09:30:00","open":1.0,"high":2.0,"low":0.5,"close":1.5}"#;
        let bar: Bar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.volume, None);
    }

    #[test]
    fn interval_round_trips_through_minutes() {
        for minutes in [1u32, 5, 15, 30, 60] {
            let interval = Interval::try_from(minutes).unwrap();
            assert_eq!(u32::from(interval), minutes);
        }
        assert!(Interval::try_from(7).is_err());
    }

    #[test]
    fn compact_size_limits_bars() {
        assert_eq!(OutputSize::Compact.bar_limit(), Some(100));
        assert_eq!(OutputSize::Full.bar_limit(), None);
    }
}
