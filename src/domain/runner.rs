//! Batch runner: every (max_allowed_adds, symbol, timeframe) combination.
//!
//! Data is fetched and aggregated on the calling thread; the independent
//! runs then execute sequentially or on the rayon pool. Records come back
//! in declaration order either way.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use super::backtest::{self, BacktestConfig, BacktestResult, ResultRecord};
use super::error::BacktestError;
use super::ledger::LotUnwind;
use super::ohlcv::Bar;
use super::resample;
use super::strategy::StrategyParams;
use super::timeframe::{Interval, Timeframe};
use super::universe;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub max_allowed_adds: Vec<usize>,
    pub initial_cash: f64,
    pub commission_rate: f64,
    pub ema_period: usize,
    pub unwind: LotUnwind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub base_interval: Interval,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.symbols.is_empty() {
            return Err(BacktestError::invalid("backtest", "symbols", "no symbols configured"));
        }
        if self.timeframes.is_empty() {
            return Err(BacktestError::invalid(
                "backtest",
                "timeframes",
                "no timeframes configured",
            ));
        }
        if self.max_allowed_adds.is_empty() {
            return Err(BacktestError::invalid("backtest", "max_adds", "no max values configured"));
        }
        for tf in &self.timeframes {
            if !tf.interval.is_multiple_of(self.base_interval) {
                return Err(BacktestError::invalid(
                    "backtest",
                    "timeframes",
                    format!(
                        "{} ({}) is not a multiple of base interval {}",
                        tf.label, tf.interval, self.base_interval
                    ),
                ));
            }
        }
        if self.start >= self.end {
            return Err(BacktestError::invalid(
                "backtest",
                "end_date",
                "end_date must be after start_date",
            ));
        }
        for &max in &self.max_allowed_adds {
            self.backtest_config(max).validate()?;
        }
        Ok(())
    }

    pub fn backtest_config(&self, max_allowed_adds: usize) -> BacktestConfig {
        BacktestConfig {
            initial_cash: self.initial_cash,
            commission_rate: self.commission_rate,
            strategy: StrategyParams {
                ema_period: self.ema_period,
                max_allowed_adds,
                unwind: self.unwind,
            },
        }
    }
}

/// A symbol or (symbol, timeframe) that produced no record.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRun {
    pub symbol: String,
    pub timeframe: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub records: Vec<ResultRecord>,
    pub skipped: Vec<SkippedRun>,
}

impl BatchReport {
    /// Records for one max value, in symbol/timeframe order.
    pub fn for_max(&self, max_allowed_adds: usize) -> impl Iterator<Item = &ResultRecord> {
        self.records
            .iter()
            .filter(move |r| r.max_allowed_adds == max_allowed_adds)
    }
}

struct Prepared {
    symbol: String,
    timeframe: String,
    bars: Vec<Bar>,
}

struct Job<'a> {
    max_allowed_adds: usize,
    input: &'a Prepared,
}

pub fn run_batch(
    data_port: &dyn DataPort,
    config: &RunConfig,
    parallel: bool,
) -> Result<BatchReport, BacktestError> {
    config.validate()?;

    let loaded = universe::load_universe(
        data_port,
        &config.symbols,
        config.base_interval,
        config.start,
        config.end,
    )?;

    let mut report = BatchReport {
        records: Vec::new(),
        skipped: loaded
            .skipped
            .into_iter()
            .map(|s| SkippedRun {
                symbol: s.symbol,
                timeframe: None,
                reason: s.reason,
            })
            .collect(),
    };

    let mut prepared = Vec::new();
    for series in &loaded.series {
        for tf in &config.timeframes {
            let bars = if tf.interval == config.base_interval {
                series.bars.clone()
            } else {
                resample::aggregate(&series.bars, tf.interval)
            };
            if bars.len() < config.ema_period {
                warn!(
                    symbol = %series.symbol,
                    timeframe = %tf.label,
                    bars = bars.len(),
                    "skipping timeframe: not enough bars"
                );
                report.skipped.push(SkippedRun {
                    symbol: series.symbol.clone(),
                    timeframe: Some(tf.label.clone()),
                    reason: format!("{} bars, need {}", bars.len(), config.ema_period),
                });
                continue;
            }
            prepared.push(Prepared {
                symbol: series.symbol.clone(),
                timeframe: tf.label.clone(),
                bars,
            });
        }
    }

    let jobs: Vec<Job<'_>> = config
        .max_allowed_adds
        .iter()
        .flat_map(|&max| {
            prepared.iter().map(move |input| Job {
                max_allowed_adds: max,
                input,
            })
        })
        .collect();

    info!(jobs = jobs.len(), parallel, "running backtests");

    let run = |job: &Job<'_>| -> Result<BacktestResult, BacktestError> {
        backtest::run_backtest(
            &job.input.symbol,
            &job.input.timeframe,
            &job.input.bars,
            &config.backtest_config(job.max_allowed_adds),
        )
    };

    let outcomes: Vec<Result<BacktestResult, BacktestError>> = if parallel {
        jobs.par_iter().map(run).collect()
    } else {
        jobs.iter().map(run).collect()
    };

    for (job, outcome) in jobs.iter().zip(outcomes) {
        match outcome {
            Ok(result) => report.records.push(result.record),
            Err(e) if e.is_skippable() => {
                warn!(
                    symbol = %job.input.symbol,
                    timeframe = %job.input.timeframe,
                    error = %e,
                    "run skipped"
                );
                report.skipped.push(SkippedRun {
                    symbol: job.input.symbol.clone(),
                    timeframe: Some(job.input.timeframe.clone()),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
