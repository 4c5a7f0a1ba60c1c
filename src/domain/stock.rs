//! Stocks, ownership rows, and the portfolio DTOs handed to the view layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::money::round_cents;

/// A tradable stock with its cached last-traded price.
///
/// `current_price` is refreshed from the external market-data provider when
/// older than the configured staleness window.
#[derive(Debug, Clone, PartialEq)]
pub struct Stock {
    pub stock_id: Uuid,
    pub symbol: String,
    pub name: String,
    pub current_price: Decimal,
    pub last_price_update: DateTime<Utc>,
}

/// How many shares of one stock an account holds. Exactly one row exists
/// per (account, stock) pair; a row that reaches quantity 0 is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockOwnership {
    pub account_id: Uuid,
    pub stock_id: Uuid,
    pub quantity: i32,
}

/// One line of the bank's tradable inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockListing {
    pub stock_id: Uuid,
    pub symbol: String,
    pub name: String,
    pub current_price: Decimal,
    pub available: i32,
}

/// One line of a customer portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub stock_id: Uuid,
    pub symbol: String,
    pub name: String,
    pub quantity: i32,
    pub current_price: Decimal,
    pub total_value: Decimal,
}

impl Holding {
    pub fn new(
        stock_id: Uuid,
        symbol: String,
        name: String,
        quantity: i32,
        current_price: Decimal,
    ) -> Self {
        let total_value = round_cents(current_price * Decimal::from(quantity));
        Self {
            stock_id,
            symbol,
            name,
            quantity,
            current_price,
            total_value,
        }
    }
}
