//! Data access port trait.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Source of time-ordered bars for a (symbol, interval) pair.
///
/// `start` is inclusive from midnight; `end` is exclusive at midnight.
/// Implementations return `NoDataAvailable` rather than an empty vector
/// when nothing matches.
pub trait DataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, BacktestError>;

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, BacktestError>;

    /// First and last timestamps plus bar count, or `None` when no data.
    fn get_data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, BacktestError>;
}

/// `timestamp` falls in `[start 00:00, end 00:00)`.
pub fn in_window(timestamp: NaiveDateTime, start: NaiveDate, end: NaiveDate) -> bool {
    timestamp >= start.and_time(NaiveTime::MIN) && timestamp < end.and_time(NaiveTime::MIN)
}
