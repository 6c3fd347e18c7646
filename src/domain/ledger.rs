//! Portfolio ledger: cash, the open position and trade bookkeeping.
//!
//! Buy sizing is `cash / reference_price / max_allowed_adds`. Cash shrinks
//! after each buy, so later lots are smaller than the first.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::error::BacktestError;
use super::execution::{Fill, Side, calculate_commission};
use super::position::{ClosedTrade, Lot, Position, SIZE_EPSILON};

/// Relative slack allowed when a buy costs exactly the available cash.
const CASH_TOLERANCE: f64 = 1e-9;

/// What a sell does to the lot records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LotUnwind {
    /// Remove one lot record per sell, whatever quantity was traded.
    #[default]
    PopOldest,
    /// Remove every lot record once the held size reaches zero.
    DrainAll,
}

impl FromStr for LotUnwind {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pop_oldest" => Ok(LotUnwind::PopOldest),
            "drain_all" => Ok(LotUnwind::DrainAll),
            other => Err(BacktestError::invalid(
                "strategy",
                "lot_unwind",
                format!("unknown policy '{other}' (expected pop_oldest or drain_all)"),
            )),
        }
    }
}

impl fmt::Display for LotUnwind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LotUnwind::PopOldest => write!(f, "pop_oldest"),
            LotUnwind::DrainAll => write!(f, "drain_all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub cash: f64,
    pub initial_cash: f64,
    pub commission_rate: f64,
    pub max_allowed_adds: usize,
    pub trade_count: usize,
    pub position: Option<Position>,
    pub fills: Vec<Fill>,
    pub closed_trades: Vec<ClosedTrade>,
    pub unwind: LotUnwind,
}

impl Ledger {
    pub fn new(
        initial_cash: f64,
        commission_rate: f64,
        max_allowed_adds: usize,
        unwind: LotUnwind,
    ) -> Self {
        Ledger {
            cash: initial_cash,
            initial_cash,
            commission_rate,
            max_allowed_adds,
            trade_count: 0,
            position: None,
            fills: Vec::new(),
            closed_trades: Vec::new(),
            unwind,
        }
    }

    pub fn state(&self) -> PositionState {
        match self.position {
            Some(_) => PositionState::Long,
            None => PositionState::Flat,
        }
    }

    pub fn has_exposure(&self) -> bool {
        self.position.as_ref().is_some_and(Position::has_exposure)
    }

    pub fn position_size(&self) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.size)
    }

    /// Average entry price of the held quantity; `None` when nothing is held.
    pub fn entry_reference(&self) -> Option<f64> {
        self.position
            .as_ref()
            .filter(|p| p.has_exposure())
            .map(|p| p.average_price)
    }

    pub fn last_entry_price(&self) -> Option<f64> {
        self.position.as_ref().and_then(Position::last_entry_price)
    }

    /// Prices of the remaining lot records, oldest first.
    pub fn open_lot_prices(&self) -> Vec<f64> {
        self.position
            .as_ref()
            .map(|p| p.lots.iter().map(|lot| lot.price).collect())
            .unwrap_or_default()
    }

    pub fn portfolio_value(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.market_value(price))
    }

    /// Open or add a lot at `reference_price`.
    ///
    /// Leaves the ledger untouched and returns `InsufficientCash` whenever
    /// the sizing formula cannot produce a positive, affordable size.
    pub fn buy(&mut self, reference_price: f64, at: NaiveDateTime) -> Result<Fill, BacktestError> {
        let insufficient = BacktestError::InsufficientCash {
            cash: self.cash,
            reference_price,
        };
        if self.cash <= 0.0 || !(reference_price.is_finite() && reference_price > 0.0) {
            return Err(insufficient);
        }
        if self.max_allowed_adds == 0 {
            return Err(BacktestError::invariant("buy with max_allowed_adds = 0"));
        }

        let size = self.cash / reference_price / self.max_allowed_adds as f64;
        if !(size.is_finite() && size > 0.0) {
            return Err(insufficient);
        }

        let value = size * reference_price;
        let commission = calculate_commission(value, self.commission_rate);
        let total = value + commission;
        if total > self.cash * (1.0 + CASH_TOLERANCE) {
            return Err(insufficient);
        }

        self.cash = (self.cash - total).max(0.0);
        self.position.get_or_insert_with(Position::new).add_lot(
            Lot {
                price: reference_price,
                size,
                opened_at: at,
            },
            commission,
        );
        self.trade_count += 1;

        let fill = Fill {
            side: Side::Buy,
            timestamp: at,
            price: reference_price,
            size,
            commission,
        };
        self.fills.push(fill.clone());
        Ok(fill)
    }

    /// Sell `size` of the held position at `price`, then unwind lot records.
    ///
    /// Selling more than is held, or with nothing held, is an invariant
    /// violation.
    pub fn sell(
        &mut self,
        size: f64,
        price: f64,
        at: NaiveDateTime,
    ) -> Result<Fill, BacktestError> {
        let position = match self.position.as_mut() {
            Some(p) if p.has_exposure() => p,
            _ => return Err(BacktestError::invariant("sell with no open position")),
        };
        if !(size > 0.0 && size <= position.size * (1.0 + CASH_TOLERANCE) + SIZE_EPSILON) {
            return Err(BacktestError::invariant(format!(
                "sell of {size} against held size {}",
                position.size
            )));
        }

        let proceeds = size * price;
        let commission = calculate_commission(proceeds, self.commission_rate);
        let entry_price = position.average_price;
        let opened_at = position
            .lots
            .front()
            .map_or(at, |lot| lot.opened_at);
        let entry_commission = position.reduce(size);

        match self.unwind {
            LotUnwind::DrainAll if !position.has_exposure() => position.lots.clear(),
            _ => {
                position.lots.pop_front();
            }
        }
        if position.is_closed() {
            self.position = None;
        }

        self.cash += proceeds - commission;
        self.trade_count += 1;
        self.closed_trades.push(ClosedTrade {
            size,
            entry_price,
            exit_price: price,
            opened_at,
            closed_at: at,
            pnl: size * (price - entry_price) - entry_commission - commission,
        });

        let fill = Fill {
            side: Side::Sell,
            timestamp: at,
            price,
            size,
            commission,
        };
        self.fills.push(fill.clone());
        Ok(fill)
    }
}
