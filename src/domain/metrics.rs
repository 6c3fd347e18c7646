//! Equity curve tracking and drawdown statistics.

use chrono::NaiveDateTime;

use super::error::BacktestError;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Samples portfolio value once per processed bar.
///
/// `equity_curve` holds the value sampled before the bar's strategy step;
/// `settled` holds the value after that bar's fills.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTracker {
    equity_curve: Vec<EquityPoint>,
    settled: Vec<f64>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, timestamp: NaiveDateTime, value: f64) {
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity: value,
        });
    }

    pub fn settle(&mut self, value: f64) {
        self.settled.push(value);
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn len(&self) -> usize {
        self.equity_curve.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equity_curve.is_empty()
    }

    /// Maximum drawdown of the equity curve in percent (≤ 0).
    ///
    /// The curve is normalised by its first sample. An empty curve, or one
    /// starting at exactly zero, has no drawdown; a negative or non-finite
    /// first sample is rejected.
    pub fn finalize(&self) -> Result<f64, BacktestError> {
        let Some(first) = self.equity_curve.first().map(|p| p.equity) else {
            return Ok(0.0);
        };
        if first == 0.0 {
            return Ok(0.0);
        }
        if !(first.is_finite() && first > 0.0) {
            return Err(BacktestError::invalid(
                "backtest",
                "initial_cash",
                format!("first equity sample {first} cannot normalise the curve"),
            ));
        }

        let mut peak = f64::NEG_INFINITY;
        let mut worst = 0.0_f64;
        for point in &self.equity_curve {
            let normalized = point.equity / first;
            peak = peak.max(normalized);
            let drawdown = (normalized - peak) / peak;
            worst = worst.min(drawdown);
        }

        Ok(worst * 100.0)
    }

    /// Largest peak-to-trough decline of the settled values, as a positive
    /// percentage.
    pub fn peak_drawdown_pct(&self) -> f64 {
        let mut peak = f64::NEG_INFINITY;
        let mut max_dd = 0.0_f64;
        for &value in &self.settled {
            if value > peak {
                peak = value;
            } else if peak > 0.0 {
                max_dd = max_dd.max((peak - value) / peak);
            }
        }
        max_dd * 100.0
    }

    /// Consume the tracker, handing over the equity curve.
    pub fn into_curve(self) -> Vec<EquityPoint> {
        self.equity_curve
    }
}

/// Sum of per-lot percentage moves from entry to `last_close`.
///
/// Percentages are summed without weighting by lot size. Non-positive entry
/// prices are skipped.
pub fn unrealized_profit_pct(entry_prices: &[f64], last_close: f64) -> f64 {
    entry_prices
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| (last_close - p) / p * 100.0)
        .sum()
}
