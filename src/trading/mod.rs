//! Stock trading module
//!
//! Buy/sell of stock between customer custody accounts and the bank's
//! custody account, settled in cash through their reference checking
//! accounts, plus the price cache fed by the external market-data provider.

mod engine;
mod market;

pub use engine::TradingEngine;
pub use market::{MarketData, MarketDataError, StaticMarketData};
