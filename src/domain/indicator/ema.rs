//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = X[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{Bar, PriceField};

pub fn calculate_ema(bars: &[Bar], field: PriceField, period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema { field, period };
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let x = field.of(bar);
        let valid = if i < period - 1 {
            sum += x;
            false
        } else if i == period - 1 {
            sum += x;
            ema = sum / period as f64;
            true
        } else {
            ema = x * k + ema * (1.0 - k);
            true
        };
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: if valid { ema } else { f64::NAN },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
