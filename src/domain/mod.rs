//! Domain types
//!
//! Pure domain model for the ledger engine: accounts, ledger entries,
//! stocks, and the money helpers shared by the services. Nothing in this
//! module touches the database.

mod account;
mod money;
mod stock;
mod timeframe;
mod transaction;

pub use account::{hash_pin, Account, AccountDetails, AccountKind};
pub use money::{round_cents, AccountTotals};
pub use stock::{Holding, Stock, StockListing, StockOwnership};
pub use timeframe::Timeframe;
pub use transaction::{NewTransaction, TradeSide, TransactionEntry, TransactionRecord};
