//! Fill records and intent execution against the ledger.

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::error::BacktestError;
use super::ledger::Ledger;
use super::strategy::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub side: Side,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub size: f64,
    pub commission: f64,
}

/// Commission on a trade value at a fractional rate (0.001 = 0.1%).
pub fn calculate_commission(trade_value: f64, commission_rate: f64) -> f64 {
    trade_value * commission_rate
}

/// Outcome of applying one intent.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Idle,
    Filled(Fill),
    /// A buy the ledger could not afford; the run continues.
    Skipped { reference_price: f64 },
}

/// Apply `intent` to the ledger.
///
/// `InsufficientCash` on a buy is downgraded to `Skipped`; every other
/// ledger error propagates.
pub fn execute(
    ledger: &mut Ledger,
    intent: Intent,
    at: NaiveDateTime,
) -> Result<ExecutionOutcome, BacktestError> {
    let result = match intent {
        Intent::Hold => return Ok(ExecutionOutcome::Idle),
        Intent::Open { reference_price } | Intent::Add { reference_price } => {
            match ledger.buy(reference_price, at) {
                Err(BacktestError::InsufficientCash { cash, .. }) => {
                    warn!(%at, cash, reference_price, "buy skipped: insufficient cash");
                    return Ok(ExecutionOutcome::Skipped { reference_price });
                }
                other => other,
            }
        }
        Intent::CloseAll { size, price } => ledger.sell(size, price, at),
    };

    let fill = result?;
    debug!(
        %at,
        side = ?fill.side,
        price = fill.price,
        size = fill.size,
        commission = fill.commission,
        trade_count = ledger.trade_count,
        "fill"
    );
    Ok(ExecutionOutcome::Filled(fill))
}
