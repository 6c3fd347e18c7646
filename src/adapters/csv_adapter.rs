//! CSV file data adapter.
//!
//! One file per (symbol, interval): `{SYMBOL}_{interval}.csv` with columns
//! `timestamp,open,high,low,close,volume`.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::{Bar, TIMESTAMP_FORMAT};
use crate::ports::data_port::{in_window, DataPort};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }

    fn read_all(&self, symbol: &str, interval: &str) -> Result<Vec<Bar>, BacktestError> {
        let path = self.csv_path(symbol, interval);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BacktestError::NoDataAvailable {
                    symbol: symbol.to_string(),
                    interval: interval.to_string(),
                });
            }
            Err(e) => {
                return Err(BacktestError::Database {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| BacktestError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let row = line + 2;

            let ts_str = record.get(0).ok_or_else(|| BacktestError::Database {
                reason: format!("row {row}: missing timestamp column"),
            })?;
            let timestamp = parse_timestamp(ts_str).ok_or_else(|| BacktestError::Database {
                reason: format!("row {row}: invalid timestamp '{ts_str}'"),
            })?;

            bars.push(Bar {
                timestamp,
                open: column(&record, 1, "open", row)?,
                high: column(&record, 2, "high", row)?,
                low: column(&record, 3, "low", row)?,
                close: column(&record, 4, "close", row)?,
                volume: column(&record, 5, "volume", row)?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(BacktestError::Database {
                reason: format!(
                    "duplicate timestamp {} in {}",
                    pair[0].timestamp,
                    path.display()
                ),
            });
        }
        Ok(bars)
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn column(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    row: usize,
) -> Result<f64, BacktestError> {
    record
        .get(index)
        .ok_or_else(|| BacktestError::Database {
            reason: format!("row {row}: missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| BacktestError::Database {
            reason: format!("row {row}: invalid {name} value: {e}"),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, BacktestError> {
        let bars: Vec<Bar> = self
            .read_all(symbol, interval)?
            .into_iter()
            .filter(|b| in_window(b.timestamp, start, end))
            .collect();

        if bars.is_empty() {
            return Err(BacktestError::NoDataAvailable {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            });
        }
        debug!(%symbol, %interval, bars = bars.len(), "read csv");
        Ok(bars)
    }

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, BacktestError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BacktestError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", interval);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| BacktestError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, BacktestError> {
        let bars = match self.read_all(symbol, interval) {
            Ok(bars) => bars,
            Err(BacktestError::NoDataAvailable { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}
