//! Balance Calculator
//!
//! An account's balance is its opening balance plus the signed sum of every
//! ledger entry touching it: entries it sent subtract, entries it received
//! add. Custody accounts hold securities, not cash, and always report
//! balance 0 without consulting the ledger; their cash sits in the
//! reference checking account.
//!
//! A history entry referencing neither side of the queried account is a
//! "rogue" transaction: a storage or query defect, never a user error.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::{round_cents, Account, AccountKind, AccountTotals, Timeframe, TransactionRecord};
use crate::error::{EngineError, EngineResult};
use crate::registry;

use super::store::fetch_history;

/// Fold ledger entries into a balance.
pub fn settle(
    account_id: Uuid,
    opening_balance: Decimal,
    entries: &[TransactionRecord],
) -> EngineResult<Decimal> {
    let mut balance = opening_balance;

    for entry in entries {
        if entry.sending_account_id == Some(account_id) {
            balance -= entry.amount;
        } else if entry.receiving_account_id == Some(account_id) {
            balance += entry.amount;
        } else {
            tracing::error!(
                transaction_id = %entry.transaction_id,
                %account_id,
                "rogue ledger entry returned for account it does not reference"
            );
            return Err(EngineError::RogueTransaction {
                transaction_id: entry.transaction_id,
                account_id,
            });
        }
    }

    Ok(round_cents(balance))
}

/// Fold ledger entries into per-side totals, each rounded independently.
pub fn sum_totals(account_id: Uuid, entries: &[TransactionRecord]) -> EngineResult<AccountTotals> {
    let mut total_sent = Decimal::ZERO;
    let mut total_received = Decimal::ZERO;

    for entry in entries {
        if entry.sending_account_id == Some(account_id) {
            total_sent += entry.amount;
        } else if entry.receiving_account_id == Some(account_id) {
            total_received += entry.amount;
        } else {
            tracing::error!(
                transaction_id = %entry.transaction_id,
                %account_id,
                "rogue ledger entry returned for account it does not reference"
            );
            return Err(EngineError::RogueTransaction {
                transaction_id: entry.transaction_id,
                account_id,
            });
        }
    }

    Ok(AccountTotals {
        total_sent: round_cents(total_sent),
        total_received: round_cents(total_received),
    })
}

/// Derive the balance of an already-resolved account on the given executor.
/// Sufficiency checks call this with their own transaction so the check and
/// the subsequent write observe the same committed state.
pub(crate) async fn balance_for<'e, E>(executor: E, account: &Account) -> EngineResult<Decimal>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    if account.kind() == AccountKind::Custody {
        return Ok(Decimal::ZERO);
    }

    let entries = fetch_history(executor, account.account_id, Timeframe::AllTime).await?;
    settle(account.account_id, account.opening_balance, &entries)
}

/// Balance and totals reads over the pool.
#[derive(Debug, Clone)]
pub struct Balances {
    pool: PgPool,
}

impl Balances {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current balance, derived from the full ledger at the time of the call.
    pub async fn balance(&self, account_id: Uuid) -> EngineResult<Decimal> {
        let account = registry::fetch_account(&self.pool, account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;

        balance_for(&self.pool, &account).await
    }

    /// Sent/received totals within the timeframe.
    pub async fn totals(&self, account_id: Uuid, timeframe: Timeframe) -> EngineResult<AccountTotals> {
        let account = registry::fetch_account(&self.pool, account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;

        let entries = fetch_history(&self.pool, account.account_id, timeframe).await?;
        sum_totals(account.account_id, &entries)
    }
}
