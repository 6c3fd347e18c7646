//! Lot and position tracking.

use chrono::NaiveDateTime;
use std::collections::VecDeque;

/// Held sizes below this are treated as flat.
pub const SIZE_EPSILON: f64 = 1e-12;

/// One buy contributing to an open position.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub price: f64,
    pub size: f64,
    pub opened_at: NaiveDateTime,
}

/// Open position: lot records (oldest first) plus the held quantity.
///
/// `size` and `lots` move independently: a sell reduces `size` by the traded
/// quantity and removes lot records per the ledger's unwind policy, so lot
/// records may outlive the exposure they were bought with.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub lots: VecDeque<Lot>,
    pub size: f64,
    pub average_price: f64,
    pub entry_commission: f64,
}

impl Position {
    pub fn new() -> Self {
        Position {
            lots: VecDeque::new(),
            size: 0.0,
            average_price: 0.0,
            entry_commission: 0.0,
        }
    }

    pub fn has_exposure(&self) -> bool {
        self.size > SIZE_EPSILON
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }

    pub fn last_entry_price(&self) -> Option<f64> {
        self.lots.back().map(|lot| lot.price)
    }

    /// Add a lot; the average price restarts from this lot when nothing is held.
    pub fn add_lot(&mut self, lot: Lot, commission: f64) {
        if self.has_exposure() {
            let new_size = self.size + lot.size;
            self.average_price = (self.average_price * self.size + lot.price * lot.size) / new_size;
            self.size = new_size;
            self.entry_commission += commission;
        } else {
            self.size = lot.size;
            self.average_price = lot.price;
            self.entry_commission = commission;
        }
        self.lots.push_back(lot);
    }

    /// Reduce the held size. Returns the entry commission attributed to the
    /// reduced quantity.
    pub fn reduce(&mut self, size: f64) -> f64 {
        let share = if self.size > 0.0 {
            (size / self.size).min(1.0)
        } else {
            1.0
        };
        let attributed = self.entry_commission * share;
        self.entry_commission -= attributed;
        self.size -= size;
        if self.size <= SIZE_EPSILON {
            self.size = 0.0;
            self.average_price = 0.0;
            self.entry_commission = 0.0;
        }
        attributed
    }

    /// Nothing held and no lot records left.
    pub fn is_closed(&self) -> bool {
        !self.has_exposure() && self.lots.is_empty()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub opened_at: NaiveDateTime,
    pub closed_at: NaiveDateTime,
    pub pnl: f64,
}
