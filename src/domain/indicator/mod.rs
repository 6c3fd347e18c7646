//! Technical indicator types.
//!
//! - `IndicatorPoint`: one point of an indicator series, flagged invalid during warm-up
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a series aligned one-to-one with its bars
//! - `IndicatorSet`: the EMA(high)/EMA(low) pair the strategy reads

pub mod ema;

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::{Bar, PriceField};
use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema { field: PriceField, period: usize },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value at bar `index`, `None` while the indicator is still warming up.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .filter(|point| point.valid)
            .map(|point| point.value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema { field, period } => write!(f, "EMA({},{})", field.name(), period),
        }
    }
}

/// Indicator values the strategy consults on one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub ema_high: f64,
    pub ema_low: f64,
}

#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub ema_high: IndicatorSeries,
    pub ema_low: IndicatorSeries,
}

impl IndicatorSet {
    pub fn compute(bars: &[Bar], period: usize) -> Self {
        IndicatorSet {
            ema_high: ema::calculate_ema(bars, PriceField::High, period),
            ema_low: ema::calculate_ema(bars, PriceField::Low, period),
        }
    }

    /// Read both EMAs at `index`. Reading inside the warm-up prefix is a
    /// caller bug, reported as an invariant violation.
    pub fn snapshot(&self, index: usize) -> Result<IndicatorSnapshot, BacktestError> {
        match (self.ema_high.value_at(index), self.ema_low.value_at(index)) {
            (Some(ema_high), Some(ema_low)) => Ok(IndicatorSnapshot { ema_high, ema_low }),
            _ => Err(BacktestError::invariant(format!(
                "indicator read at bar {index} before {} / {} are defined",
                self.ema_high.indicator_type, self.ema_low.indicator_type
            ))),
        }
    }
}
