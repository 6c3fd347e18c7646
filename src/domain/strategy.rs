//! EMA-band pyramiding strategy.
//!
//! `decide` is a pure function of the bar, the indicator snapshot and a
//! read-only view of the ledger. Variants are expressed through
//! [`StrategyParams`].

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::ledger::{Ledger, LotUnwind};
use crate::domain::ohlcv::Bar;
use crate::domain::position::SIZE_EPSILON;

pub const DEFAULT_EMA_PERIOD: usize = 89;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyParams {
    pub ema_period: usize,
    pub max_allowed_adds: usize,
    pub unwind: LotUnwind,
}

impl StrategyParams {
    pub fn new(max_allowed_adds: usize) -> Self {
        StrategyParams {
            ema_period: DEFAULT_EMA_PERIOD,
            max_allowed_adds,
            unwind: LotUnwind::default(),
        }
    }
}

/// What the ledger should do on this bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Hold,
    Open { reference_price: f64 },
    Add { reference_price: f64 },
    CloseAll { size: f64, price: f64 },
}

/// The slice of ledger state the strategy may read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerView {
    pub held_size: f64,
    pub trade_count: usize,
    pub last_entry_price: Option<f64>,
    pub entry_reference: Option<f64>,
}

impl From<&Ledger> for LedgerView {
    fn from(ledger: &Ledger) -> Self {
        LedgerView {
            held_size: ledger.position_size(),
            trade_count: ledger.trade_count,
            last_entry_price: ledger.last_entry_price(),
            entry_reference: ledger.entry_reference(),
        }
    }
}

pub fn decide(
    params: &StrategyParams,
    bar: &Bar,
    snapshot: &IndicatorSnapshot,
    view: &LedgerView,
) -> Intent {
    let holding = view.held_size > SIZE_EPSILON;

    if bar.low > snapshot.ema_high {
        if !holding {
            return Intent::Open {
                reference_price: bar.low,
            };
        }
        let rising = view.last_entry_price.is_some_and(|last| bar.low > last);
        if view.trade_count < params.max_allowed_adds && rising {
            return Intent::Add {
                reference_price: bar.close,
            };
        }
        return Intent::Hold;
    }

    let traded_through = view.entry_reference.is_some_and(|entry| bar.low <= entry);
    if bar.high < snapshot.ema_low && traded_through && holding {
        return Intent::CloseAll {
            size: view.held_size,
            price: bar.close,
        };
    }

    Intent::Hold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    fn snap() -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema_high: 100.0,
            ema_low: 90.0,
        }
    }

    fn flat() -> LedgerView {
        LedgerView {
            held_size: 0.0,
            trade_count: 0,
            last_entry_price: None,
            entry_reference: None,
        }
    }

    fn long(trade_count: usize, last: f64, entry: f64) -> LedgerView {
        LedgerView {
            held_size: 5.0,
            trade_count,
            last_entry_price: Some(last),
            entry_reference: Some(entry),
        }
    }

    #[test]
    fn flat_entry_uses_low() {
        let intent = decide(&StrategyParams::new(5), &bar(106.0, 101.0, 104.0), &snap(), &flat());
        assert_eq!(intent, Intent::Open { reference_price: 101.0 });
    }

    #[test]
    fn low_equal_to_ema_high_does_not_enter() {
        let intent = decide(&StrategyParams::new(5), &bar(106.0, 100.0, 104.0), &snap(), &flat());
        assert_eq!(intent, Intent::Hold);
    }

    #[test]
    fn add_on_rising_low_uses_close() {
        let intent = decide(
            &StrategyParams::new(5),
            &bar(112.0, 108.0, 111.0),
            &snap(),
            &long(1, 105.0, 105.0),
        );
        assert_eq!(intent, Intent::Add { reference_price: 111.0 });
    }

    #[test]
    fn no_add_when_low_not_strictly_above_last_entry() {
        let intent = decide(
            &StrategyParams::new(5),
            &bar(112.0, 105.0, 111.0),
            &snap(),
            &long(1, 105.0, 105.0),
        );
        assert_eq!(intent, Intent::Hold);
    }

    #[test]
    fn no_add_once_trade_count_reaches_max() {
        let intent = decide(
            &StrategyParams::new(3),
            &bar(120.0, 115.0, 118.0),
            &snap(),
            &long(3, 105.0, 103.0),
        );
        assert_eq!(intent, Intent::Hold);
    }

    #[test]
    fn exit_sells_full_size_at_close() {
        let intent = decide(
            &StrategyParams::new(5),
            &bar(89.0, 80.0, 85.0),
            &snap(),
            &long(2, 105.0, 104.0),
        );
        assert_eq!(intent, Intent::CloseAll { size: 5.0, price: 85.0 });
    }

    #[test]
    fn no_exit_when_low_above_entry_reference() {
        let intent = decide(
            &StrategyParams::new(5),
            &bar(89.0, 80.0, 85.0),
            &snap(),
            &long(2, 75.0, 70.0),
        );
        assert_eq!(intent, Intent::Hold);
    }

    #[test]
    fn no_exit_when_flat() {
        let intent = decide(&StrategyParams::new(5), &bar(89.0, 80.0, 85.0), &snap(), &flat());
        assert_eq!(intent, Intent::Hold);
    }

    #[test]
    fn residual_lot_history_reenters_at_low() {
        let view = LedgerView {
            held_size: 0.0,
            trade_count: 7,
            last_entry_price: Some(150.0),
            entry_reference: None,
        };
        let intent = decide(&StrategyParams::new(5), &bar(106.0, 101.0, 104.0), &snap(), &view);
        assert_eq!(intent, Intent::Open { reference_price: 101.0 });
    }

    #[test]
    fn band_interior_holds() {
        let intent = decide(
            &StrategyParams::new(5),
            &bar(99.0, 91.0, 95.0),
            &snap(),
            &long(1, 95.0, 95.0),
        );
        assert_eq!(intent, Intent::Hold);
    }
}
