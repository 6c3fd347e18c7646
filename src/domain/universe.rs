//! Symbol universe for batch backtesting.
//!
//! Parses symbol lists from configuration and loads base-interval bars for
//! each symbol, skipping symbols the provider has no usable data for.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::domain::timeframe::Interval;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl UniverseError {
    pub fn into_config_error(self, section: &str, key: &str) -> BacktestError {
        BacktestError::invalid(section, key, self.to_string())
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// One symbol's base-interval bars.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedUniverse {
    pub series: Vec<SymbolSeries>,
    pub skipped: Vec<SkippedSymbol>,
}

/// Fetch every symbol once at `base`.
///
/// No-data errors and empty results skip the symbol; any other provider
/// error aborts the load.
pub fn load_universe(
    data_port: &dyn DataPort,
    symbols: &[String],
    base: Interval,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LoadedUniverse, BacktestError> {
    let mut loaded = LoadedUniverse::default();
    let interval = base.to_string();

    for symbol in symbols {
        let bars = match data_port.fetch_bars(symbol, &interval, start, end) {
            Ok(bars) => bars,
            Err(e) if e.is_skippable() => {
                warn!(%symbol, error = %e, "skipping symbol");
                loaded.skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        if bars.is_empty() {
            warn!(%symbol, "skipping symbol: no bars in range");
            loaded.skipped.push(SkippedSymbol {
                symbol: symbol.clone(),
                reason: "no bars in range".to_string(),
            });
            continue;
        }

        info!(%symbol, bars = bars.len(), %interval, "loaded");
        loaded.series.push(SymbolSeries {
            symbol: symbol.clone(),
            bars,
        });
    }

    Ok(loaded)
}
