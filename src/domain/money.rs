//! Money helpers
//!
//! All balances and totals are reported rounded to the cent, half-up.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Round a monetary value to two decimal places, half-up.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-timeframe totals for an account, each side accumulated and rounded
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountTotals {
    pub total_sent: Decimal,
    pub total_received: Decimal,
}
