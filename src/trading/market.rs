//! Market data seam
//!
//! Last-traded prices come from an external provider that is treated as
//! unreliable: every failure is caught by the trading engine and converted
//! to `PriceFetchFailed` without disturbing the cached price.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// External market-data provider supplying last-traded price by ticker
/// symbol.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn last_price(&self, symbol: &str) -> Result<Decimal, MarketDataError>;
}

/// Fixed price table. Used by the demo seed and by tests; a real deployment
/// wires an HTTP-backed provider here.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    prices: HashMap<String, Decimal>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn last_price(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))
    }
}
