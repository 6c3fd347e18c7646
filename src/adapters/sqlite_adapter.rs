//! SQLite bar cache in front of another data port.
//!
//! Entries are keyed by (symbol, interval, start, end). An entry younger
//! than `max_age` is served from SQLite; anything else is fetched from the
//! upstream port and stored. Reads and writes each run in one transaction,
//! so a reader sees a whole entry or none.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::{Bar, TIMESTAMP_FORMAT};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub type Clock = Box<dyn Fn() -> NaiveDateTime>;

fn pool_err(e: r2d2::Error) -> BacktestError {
    BacktestError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> BacktestError {
    BacktestError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_ts(raw: &str) -> Result<NaiveDateTime, BacktestError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| BacktestError::Database {
        reason: format!("invalid cached timestamp '{raw}': {e}"),
    })
}

struct CacheKey<'a> {
    symbol: &'a str,
    interval: &'a str,
    start: String,
    end: String,
}

pub struct SqliteBarCache<D: DataPort> {
    pool: Pool<SqliteConnectionManager>,
    upstream: D,
    max_age: TimeDelta,
    clock: Clock,
}

impl<D: DataPort> SqliteBarCache<D> {
    pub fn open<P: AsRef<Path>>(
        path: P,
        upstream: D,
        max_age: TimeDelta,
    ) -> Result<Self, BacktestError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(4).build(manager).map_err(pool_err)?;
        Ok(Self::with_pool(pool, upstream, max_age))
    }

    pub fn in_memory(upstream: D, max_age: TimeDelta) -> Result<Self, BacktestError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self::with_pool(pool, upstream, max_age))
    }

    /// Build from the `[data]` section: `cache_path` and `cache_max_age_hours`.
    pub fn from_config(config: &dyn ConfigPort, upstream: D) -> Result<Self, BacktestError> {
        let path = config
            .get_string("data", "cache_path")
            .ok_or_else(|| BacktestError::ConfigMissing {
                section: "data".into(),
                key: "cache_path".into(),
            })?;
        let hours = config.get_int("data", "cache_max_age_hours", 24)?;
        if hours < 0 {
            return Err(BacktestError::invalid(
                "data",
                "cache_max_age_hours",
                "cache_max_age_hours must be non-negative",
            ));
        }
        Self::open(path, upstream, TimeDelta::hours(hours))
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>, upstream: D, max_age: TimeDelta) -> Self {
        Self {
            pool,
            upstream,
            max_age,
            clock: Box::new(|| Utc::now().naive_utc()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn initialize_schema(&self) -> Result<(), BacktestError> {
        let conn = self.pool.get().map_err(pool_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                bar_count INTEGER NOT NULL,
                PRIMARY KEY (symbol, interval, start_date, end_date)
            );
            CREATE TABLE IF NOT EXISTS cached_bars (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, interval, start_date, end_date, timestamp)
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    /// Bars for `key` when a fresh, complete entry exists.
    fn read_fresh(&self, key: &CacheKey<'_>) -> Result<Option<Vec<Bar>>, BacktestError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        let entry: Option<(String, i64)> = tx
            .query_row(
                "SELECT fetched_at, bar_count FROM cache_entries
                 WHERE symbol = ?1 AND interval = ?2 AND start_date = ?3 AND end_date = ?4",
                params![key.symbol, key.interval, key.start, key.end],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(query_err)?;

        let Some((fetched_at, bar_count)) = entry else {
            return Ok(None);
        };
        let age = (self.clock)() - parse_ts(&fetched_at)?;
        if age >= self.max_age {
            debug!(symbol = key.symbol, interval = key.interval, "cache entry stale");
            return Ok(None);
        }

        let bars = {
            let mut stmt = tx
                .prepare(
                    "SELECT timestamp, open, high, low, close, volume FROM cached_bars
                     WHERE symbol = ?1 AND interval = ?2 AND start_date = ?3 AND end_date = ?4
                     ORDER BY timestamp ASC",
                )
                .map_err(query_err)?;

            let rows = stmt
                .query_map(params![key.symbol, key.interval, key.start, key.end], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                    ))
                })
                .map_err(query_err)?;

            let mut bars = Vec::new();
            for row in rows {
                let (ts, open, high, low, close, volume) = row.map_err(query_err)?;
                bars.push(Bar {
                    timestamp: parse_ts(&ts)?,
                    open,
                    high,
                    low,
                    close,
                    volume,
                });
            }
            bars
        };
        tx.commit().map_err(query_err)?;

        if bars.len() as i64 != bar_count {
            debug!(
                symbol = key.symbol,
                interval = key.interval,
                expected = bar_count,
                found = bars.len(),
                "cache entry incomplete"
            );
            return Ok(None);
        }
        Ok(Some(bars))
    }

    fn store(&self, key: &CacheKey<'_>, bars: &[Bar]) -> Result<(), BacktestError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute(
            "DELETE FROM cached_bars
             WHERE symbol = ?1 AND interval = ?2 AND start_date = ?3 AND end_date = ?4",
            params![key.symbol, key.interval, key.start, key.end],
        )
        .map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO cached_bars
                 (symbol, interval, start_date, end_date, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    key.symbol,
                    key.interval,
                    key.start,
                    key.end,
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO cache_entries
             (symbol, interval, start_date, end_date, fetched_at, bar_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.symbol,
                key.interval,
                key.start,
                key.end,
                (self.clock)().format(TIMESTAMP_FORMAT).to_string(),
                bars.len() as i64
            ],
        )
        .map_err(query_err)?;

        tx.commit().map_err(query_err)?;
        Ok(())
    }
}

impl<D: DataPort> DataPort for SqliteBarCache<D> {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, BacktestError> {
        let key = CacheKey {
            symbol,
            interval,
            start: start.format(DATE_FORMAT).to_string(),
            end: end.format(DATE_FORMAT).to_string(),
        };

        if let Some(bars) = self.read_fresh(&key)? {
            debug!(%symbol, %interval, bars = bars.len(), "cache hit");
            return Ok(bars);
        }

        let bars = self.upstream.fetch_bars(symbol, interval, start, end)?;
        if bars.is_empty() {
            return Err(BacktestError::NoDataAvailable {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            });
        }
        self.store(&key, &bars)?;
        info!(%symbol, %interval, bars = bars.len(), "cached upstream bars");
        Ok(bars)
    }

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, BacktestError> {
        self.upstream.list_symbols(interval)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, BacktestError> {
        self.upstream.get_data_range(symbol, interval)
    }
}
