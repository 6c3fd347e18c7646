//! Bar intervals and labelled timeframes.
//!
//! Intervals are whole minutes. Accepted spellings: `30m`, `1h`, `4h`, `1d`,
//! `1wk` (suffix `min`/`w` also accepted).

use crate::domain::error::BacktestError;
use std::fmt;
use std::str::FromStr;

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;
const MINUTES_PER_WEEK: i64 = 7 * MINUTES_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    minutes: i64,
}

impl Interval {
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        (minutes > 0).then_some(Interval { minutes })
    }

    pub fn minutes(&self) -> i64 {
        self.minutes
    }

    /// `self` is a whole multiple of `base`.
    pub fn is_multiple_of(&self, base: Interval) -> bool {
        self.minutes % base.minutes == 0
    }
}

impl FromStr for Interval {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_lowercase();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (count, unit) = trimmed.split_at(split);

        let malformed = || BacktestError::invalid("backtest", "interval", format!("malformed interval '{s}'"));

        let count: i64 = count.parse().map_err(|_| malformed())?;
        let unit_minutes = match unit {
            "m" | "min" => 1,
            "h" => MINUTES_PER_HOUR,
            "d" => MINUTES_PER_DAY,
            "w" | "wk" => MINUTES_PER_WEEK,
            _ => return Err(malformed()),
        };

        count
            .checked_mul(unit_minutes)
            .and_then(Interval::from_minutes)
            .ok_or_else(malformed)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.minutes;
        if m % MINUTES_PER_WEEK == 0 {
            write!(f, "{}wk", m / MINUTES_PER_WEEK)
        } else if m % MINUTES_PER_DAY == 0 {
            write!(f, "{}d", m / MINUTES_PER_DAY)
        } else if m % MINUTES_PER_HOUR == 0 {
            write!(f, "{}h", m / MINUTES_PER_HOUR)
        } else {
            write!(f, "{}m", m)
        }
    }
}

/// A report label paired with the interval its bars are aggregated to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeframe {
    pub label: String,
    pub interval: Interval,
}

/// Parse `1D:1d,4H:4h` into timeframes, preserving declaration order.
///
/// A bare entry such as `4h` uses its uppercased spelling as the label.
pub fn parse_timeframes(input: &str) -> Result<Vec<Timeframe>, BacktestError> {
    let mut timeframes: Vec<Timeframe> = Vec::new();

    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(BacktestError::invalid(
                "backtest",
                "timeframes",
                "empty entry in timeframe list",
            ));
        }

        let (label, spec) = match token.split_once(':') {
            Some((label, spec)) => (label.trim().to_string(), spec.trim()),
            None => (token.to_uppercase(), token),
        };
        if label.is_empty() {
            return Err(BacktestError::invalid(
                "backtest",
                "timeframes",
                format!("missing label in '{token}'"),
            ));
        }
        if timeframes.iter().any(|tf| tf.label == label) {
            return Err(BacktestError::invalid(
                "backtest",
                "timeframes",
                format!("duplicate timeframe label {label}"),
            ));
        }

        let interval = spec.parse::<Interval>().map_err(|_| {
            BacktestError::invalid(
                "backtest",
                "timeframes",
                format!("malformed interval '{spec}' for {label}"),
            )
        })?;
        timeframes.push(Timeframe { label, interval });
    }

    Ok(timeframes)
}
