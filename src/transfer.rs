//! Transaction Engine
//!
//! Validates and records transfers between two accounts. Validation and the
//! ledger write always share one database transaction: the sufficiency
//! check re-derives the sender's balance inside that transaction, with the
//! sender row locked, so two concurrent debits cannot both pass against a
//! stale balance. A partial transfer is never observable.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{NewTransaction, TransactionRecord};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{self, LedgerStore};
use crate::registry;

/// Overdraft rule shared by transfers and ATM withdrawals: the balance may
/// go at most `limit` below zero. The boundary itself passes.
pub(crate) fn check_overdraft(
    balance: Decimal,
    amount: Decimal,
    limit: Decimal,
) -> EngineResult<()> {
    if balance - amount + limit < Decimal::ZERO {
        return Err(EngineError::OverdraftExceeded {
            balance,
            requested: amount,
        });
    }
    Ok(())
}

/// Validates and records transfers between accounts.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    pool: PgPool,
    ledger: LedgerStore,
    overdraft_limit: Decimal,
}

impl TransferEngine {
    pub fn new(pool: PgPool, ledger: LedgerStore, overdraft_limit: Decimal) -> Self {
        Self {
            pool,
            ledger,
            overdraft_limit,
        }
    }

    pub fn overdraft_limit(&self) -> Decimal {
        self.overdraft_limit
    }

    /// Run the transfer checks inside the caller's unit of work.
    ///
    /// Existence of each account is checked independently so the two
    /// not-found errors are distinguishable; the amount check follows, then
    /// the overdraft rule against the sender's ledger-derived balance.
    pub(crate) async fn validate_transfer_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        amount: Decimal,
        sending_id: Uuid,
        receiving_id: Uuid,
    ) -> EngineResult<()> {
        let sending = registry::fetch_account_locked(tx, sending_id)
            .await?
            .ok_or(EngineError::AccountNotFound(sending_id))?;

        registry::fetch_account(&mut **tx, receiving_id)
            .await?
            .ok_or(EngineError::AccountNotFound(receiving_id))?;

        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "transaction amount must be greater than zero (got {amount})"
            )));
        }

        let balance = ledger::balance_for(&mut **tx, &sending).await?;
        check_overdraft(balance, amount, self.overdraft_limit)
    }

    /// Record a transfer inside the caller's unit of work. Must only be
    /// invoked after validation.
    pub(crate) async fn create_transfer_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        amount: Decimal,
        sending_id: Uuid,
        receiving_id: Uuid,
    ) -> EngineResult<TransactionRecord> {
        self.ledger
            .record(tx, &NewTransaction::transfer(amount, sending_id, receiving_id))
            .await
    }

    /// Run the transfer checks without recording anything.
    pub async fn validate_transfer(
        &self,
        amount: Decimal,
        sending_id: Uuid,
        receiving_id: Uuid,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        self.validate_transfer_in(&mut tx, amount, sending_id, receiving_id)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Atomically validate and record a transfer. Either both the checks
    /// and the ledger write succeed, or nothing is recorded.
    pub async fn transfer(
        &self,
        amount: Decimal,
        sending_id: Uuid,
        receiving_id: Uuid,
    ) -> EngineResult<TransactionRecord> {
        let mut tx = self.pool.begin().await?;
        self.validate_transfer_in(&mut tx, amount, sending_id, receiving_id)
            .await?;
        let record = self
            .create_transfer_in(&mut tx, amount, sending_id, receiving_id)
            .await?;
        tx.commit().await?;

        tracing::debug!(
            transaction_id = %record.transaction_id,
            %sending_id,
            %receiving_id,
            amount = %amount,
            "transfer settled"
        );

        Ok(record)
    }
}
