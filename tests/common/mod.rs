#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use emapyramid::domain::backtest::BacktestConfig;
use emapyramid::domain::error::BacktestError;
use emapyramid::domain::ledger::LotUnwind;
pub use emapyramid::domain::ohlcv::Bar;
use emapyramid::domain::strategy::StrategyParams;
use emapyramid::ports::data_port::DataPort;
use std::cell::Cell;
use std::collections::HashMap;

pub const PERIOD: usize = 89;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Bar>, BacktestError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacktestError::Database {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(BacktestError::NoDataAvailable {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            }),
        }
    }

    fn list_symbols(&self, _interval: &str) -> Result<Vec<String>, BacktestError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        _interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, BacktestError> {
        Ok(self.data.get(symbol).and_then(|bars| {
            Some((bars.first()?.timestamp, bars.last()?.timestamp, bars.len()))
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Hourly timestamps from 2024-01-01 00:00.
pub fn ts(index: usize) -> NaiveDateTime {
    date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap() + TimeDelta::hours(index as i64)
}

pub fn make_bar(index: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: ts(index),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

/// `n` identical bars: high 101, low 99, close 100.
pub fn flat_bars(n: usize) -> Vec<Bar> {
    (0..n).map(|i| make_bar(i, 100.0, 101.0, 99.0, 100.0)).collect()
}

/// A breakout bar well above a flat 100 market.
pub fn spike_bar(index: usize) -> Bar {
    make_bar(index, 110.0, 111.0, 110.0, 110.5)
}

/// A collapse below a flat 100 market.
pub fn crash_bar(index: usize) -> Bar {
    make_bar(index, 95.0, 90.0, 85.0, 88.0)
}

/// `count` bars starting at `index` whose lows rise by one each bar from 110.
pub fn rising_bars(index: usize, count: usize) -> Vec<Bar> {
    (0..count)
        .map(|k| {
            let low = 110.0 + k as f64;
            make_bar(index + k, low, low + 1.0, low, low + 0.5)
        })
        .collect()
}

/// Flat warm-up followed by `tail`, re-indexed so timestamps stay hourly.
pub fn after_flat(tail: Vec<Bar>) -> Vec<Bar> {
    let mut bars = flat_bars(PERIOD);
    for (k, bar) in tail.into_iter().enumerate() {
        bars.push(Bar {
            timestamp: ts(PERIOD + k),
            ..bar
        });
    }
    bars
}

/// Slow sine wave around 100, hourly.
pub fn wave_bars(n: usize) -> Vec<Bar> {
    let mut prev = 100.0;
    (0..n)
        .map(|i| {
            let close = 100.0 + 20.0 * (i as f64 / 40.0).sin();
            let bar = make_bar(
                i,
                prev,
                prev.max(close) + 1.0,
                prev.min(close) - 1.0,
                close,
            );
            prev = close;
            bar
        })
        .collect()
}

pub fn sample_config(max: usize) -> BacktestConfig {
    BacktestConfig {
        initial_cash: 100_000.0,
        commission_rate: 0.001,
        strategy: StrategyParams {
            ema_period: PERIOD,
            max_allowed_adds: max,
            unwind: LotUnwind::PopOldest,
        },
    }
}
