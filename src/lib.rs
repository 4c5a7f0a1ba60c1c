//! corebank Library
//!
//! Ledger and settlement engine for a retail banking demo. All money
//! movement is an append-only transaction log; balances are always derived
//! by replaying that log against an account's opening balance.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod savings;
pub mod trading;
pub mod transfer;

pub use config::Config;
pub use error::{EngineError, EngineResult};

pub use domain::{Account, AccountDetails, AccountKind, AccountTotals, Timeframe};
pub use domain::{Holding, Stock, StockListing, StockOwnership};
pub use domain::{NewTransaction, TradeSide, TransactionEntry, TransactionRecord};

pub use ledger::{Balances, LedgerStore};
pub use registry::AccountRegistry;
pub use savings::AccountService;
pub use trading::{MarketData, MarketDataError, StaticMarketData, TradingEngine};
pub use transfer::TransferEngine;
