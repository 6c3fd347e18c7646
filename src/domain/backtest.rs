//! Single-run backtest loop over one bar sequence.
//!
//! Per bar after the EMA warm-up: sample value, decide, execute, settle.

use chrono::NaiveDateTime;
use tracing::{debug, info};

use super::error::BacktestError;
use super::execution::{self, ExecutionOutcome, Fill};
use super::indicator::IndicatorSet;
use super::ledger::Ledger;
use super::metrics::{self, EquityPoint, PerformanceTracker};
use super::ohlcv::Bar;
use super::position::ClosedTrade;
use super::strategy::{self, LedgerView, StrategyParams};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub commission_rate: f64,
    pub strategy: StrategyParams,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !(self.initial_cash.is_finite() && self.initial_cash >= 0.0) {
            return Err(BacktestError::invalid(
                "backtest",
                "initial_cash",
                "initial_cash must not be negative",
            ));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(BacktestError::invalid(
                "backtest",
                "commission_rate",
                "commission_rate must be in [0, 1)",
            ));
        }
        if self.strategy.max_allowed_adds == 0 {
            return Err(BacktestError::invalid(
                "backtest",
                "max_adds",
                "max_allowed_adds must be at least 1",
            ));
        }
        if self.strategy.ema_period == 0 {
            return Err(BacktestError::invalid(
                "strategy",
                "ema_period",
                "ema_period must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Final metrics for one (symbol, timeframe, max_allowed_adds) run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub symbol: String,
    pub timeframe: String,
    pub max_allowed_adds: usize,
    pub realized_profit_pct: f64,
    pub unrealized_profit_pct: f64,
    pub trade_count: usize,
    pub max_drawdown_pct: f64,
    pub peak_drawdown_pct: f64,
    pub final_value: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub record: ResultRecord,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub closed_trades: Vec<ClosedTrade>,
    pub skipped_buys: Vec<NaiveDateTime>,
}

pub fn run_backtest(
    symbol: &str,
    timeframe: &str,
    bars: &[Bar],
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    let params = &config.strategy;

    let Some(last_bar) = bars.last() else {
        return Err(BacktestError::NoDataAvailable {
            symbol: symbol.to_string(),
            interval: timeframe.to_string(),
        });
    };
    if bars.len() < params.ema_period {
        return Err(BacktestError::InsufficientData {
            symbol: symbol.to_string(),
            interval: timeframe.to_string(),
            bars: bars.len(),
            minimum: params.ema_period,
        });
    }

    let indicators = IndicatorSet::compute(bars, params.ema_period);
    let mut ledger = Ledger::new(
        config.initial_cash,
        config.commission_rate,
        params.max_allowed_adds,
        params.unwind,
    );
    let mut tracker = PerformanceTracker::new();
    let mut skipped_buys = Vec::new();

    let warmup = params.ema_period - 1;
    for (index, bar) in bars.iter().enumerate().skip(warmup) {
        tracker.sample(bar.timestamp, ledger.portfolio_value(bar.close));

        let snapshot = indicators.snapshot(index)?;
        let intent = strategy::decide(params, bar, &snapshot, &LedgerView::from(&ledger));
        if let ExecutionOutcome::Skipped { .. } = execution::execute(&mut ledger, intent, bar.timestamp)? {
            skipped_buys.push(bar.timestamp);
        }

        tracker.settle(ledger.portfolio_value(bar.close));
    }

    let max_drawdown_pct = tracker.finalize()?;
    let final_value = ledger.portfolio_value(last_bar.close);
    let realized_profit_pct = if config.initial_cash > 0.0 {
        (final_value - config.initial_cash) / config.initial_cash * 100.0
    } else {
        0.0
    };
    let unrealized_profit_pct =
        metrics::unrealized_profit_pct(&ledger.open_lot_prices(), last_bar.close);

    let record = ResultRecord {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        max_allowed_adds: params.max_allowed_adds,
        realized_profit_pct,
        unrealized_profit_pct,
        trade_count: ledger.trade_count,
        max_drawdown_pct,
        peak_drawdown_pct: tracker.peak_drawdown_pct(),
        final_value,
    };

    debug!(
        symbol,
        timeframe,
        bars = bars.len(),
        samples = tracker.len(),
        skipped = skipped_buys.len(),
        "run complete"
    );
    info!(
        symbol,
        timeframe,
        max = params.max_allowed_adds,
        realized = format!("{:.2}", record.realized_profit_pct),
        trades = record.trade_count,
        "backtest finished"
    );

    Ok(BacktestResult {
        record,
        equity_curve: tracker.into_curve(),
        fills: ledger.fills,
        closed_trades: ledger.closed_trades,
        skipped_buys,
    })
}
