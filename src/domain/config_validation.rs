//! Configuration validation.
//!
//! Validates all config fields before any data is fetched.

use crate::domain::error::BacktestError;
use crate::domain::ledger::LotUnwind;
use crate::domain::timeframe::{parse_timeframes, Interval};
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_symbols(config)?;
    validate_max_adds(config)?;
    validate_initial_cash(config)?;
    validate_commission(config)?;
    validate_dates(config)?;
    validate_intervals(config)?;
    validate_ema_period(config)?;
    validate_lot_unwind(config)?;
    validate_data_source(config)?;
    Ok(())
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, BacktestError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(BacktestError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let raw = required(config, "backtest", "symbols")?;
    parse_symbols(&raw).map_err(|e| e.into_config_error("backtest", "symbols"))?;
    Ok(())
}

/// Parse a comma-separated list of `max_allowed_adds` values.
pub fn parse_max_adds(input: &str) -> Result<Vec<usize>, BacktestError> {
    let mut values = Vec::new();
    for token in input.split(',') {
        let token = token.trim();
        let value: usize = token.parse().map_err(|_| {
            BacktestError::invalid(
                "backtest",
                "max_adds",
                format!("'{token}' is not a positive integer"),
            )
        })?;
        if value == 0 {
            return Err(BacktestError::invalid(
                "backtest",
                "max_adds",
                "max_adds values must be at least 1",
            ));
        }
        if values.contains(&value) {
            return Err(BacktestError::invalid(
                "backtest",
                "max_adds",
                format!("duplicate max_adds value {value}"),
            ));
        }
        values.push(value);
    }
    Ok(values)
}

fn validate_max_adds(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let raw = required(config, "backtest", "max_adds")?;
    parse_max_adds(&raw)?;
    Ok(())
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let value = config.get_double("backtest", "initial_cash", 100_000.0)?;
    if !(value.is_finite() && value >= 0.0) {
        return Err(BacktestError::invalid(
            "backtest",
            "initial_cash",
            "initial_cash must not be negative",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let value = config.get_double("backtest", "commission_rate", 0.001)?;
    if !(0.0..1.0).contains(&value) {
        return Err(BacktestError::invalid(
            "backtest",
            "commission_rate",
            "commission_rate must be in [0, 1)",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, BacktestError> {
    match value {
        None => Err(BacktestError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
            BacktestError::invalid(
                "backtest",
                field,
                format!("invalid {field} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(BacktestError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

pub fn base_interval(config: &dyn ConfigPort) -> Result<Interval, BacktestError> {
    let raw = config
        .get_string("backtest", "base_interval")
        .unwrap_or_else(|| "1h".to_string());
    raw.parse::<Interval>().map_err(|_| {
        BacktestError::invalid(
            "backtest",
            "base_interval",
            format!("malformed interval '{raw}'"),
        )
    })
}

fn validate_intervals(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let base = base_interval(config)?;
    let raw = required(config, "backtest", "timeframes")?;
    for tf in parse_timeframes(&raw)? {
        if !tf.interval.is_multiple_of(base) {
            return Err(BacktestError::invalid(
                "backtest",
                "timeframes",
                format!("{} ({}) is not a multiple of base interval {base}", tf.label, tf.interval),
            ));
        }
    }
    Ok(())
}

fn validate_ema_period(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let value = config.get_int("strategy", "ema_period", 89)?;
    if value < 1 {
        return Err(BacktestError::invalid(
            "strategy",
            "ema_period",
            "ema_period must be at least 1",
        ));
    }
    Ok(())
}

fn validate_lot_unwind(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(raw) = config.get_string("strategy", "lot_unwind") {
        raw.parse::<LotUnwind>()?;
    }
    Ok(())
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    required(config, "data", "csv_dir")?;
    let hours = config.get_int("data", "cache_max_age_hours", 24)?;
    if hours < 0 {
        return Err(BacktestError::invalid(
            "data",
            "cache_max_age_hours",
            "cache_max_age_hours must be non-negative",
        ));
    }
    Ok(())
}
