//! Ledger module
//!
//! The append-only transaction log and the balance calculator that derives
//! account balances from it. Balances are never materialized; every read
//! folds the ledger at the time of the call.

mod balance;
mod store;

pub use balance::{settle, sum_totals, Balances};
pub use store::LedgerStore;

pub(crate) use balance::balance_for;
pub(crate) use store::fetch_history;
