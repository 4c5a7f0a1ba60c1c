//! Savings and ATM operations
//!
//! Higher-level operations built on the Transaction Engine. Each call is a
//! single atomic unit of work: money moves between a savings account and
//! its reference checking account, or out of a checking account through an
//! ATM. A failure anywhere inside rolls the whole operation back and is
//! wrapped in the operation-specific error.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Account, AccountDetails, AccountKind, NewTransaction, TransactionRecord};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{self, LedgerStore};
use crate::registry;
use crate::transfer::{check_overdraft, TransferEngine};

/// Savings deposits/withdrawals and PIN-gated ATM withdrawals.
#[derive(Debug, Clone)]
pub struct AccountService {
    pool: PgPool,
    transfers: TransferEngine,
    ledger: LedgerStore,
}

impl AccountService {
    pub fn new(pool: PgPool, transfers: TransferEngine, ledger: LedgerStore) -> Self {
        Self {
            pool,
            transfers,
            ledger,
        }
    }

    /// Move funds from the reference checking account into the savings
    /// account. Any failure is reported as `DepositFailed` with the ledger
    /// untouched.
    pub async fn deposit_savings(
        &self,
        savings_id: Uuid,
        amount: Decimal,
    ) -> EngineResult<TransactionRecord> {
        match self.deposit_savings_inner(savings_id, amount).await {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(%savings_id, amount = %amount, error = %e, "savings deposit failed");
                Err(EngineError::DepositFailed(Box::new(e)))
            }
        }
    }

    async fn deposit_savings_inner(
        &self,
        savings_id: Uuid,
        amount: Decimal,
    ) -> EngineResult<TransactionRecord> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "deposit amount must be greater than zero (got {amount})"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let (savings, reference_id) = resolve_savings(&mut tx, savings_id).await?;

        self.transfers
            .validate_transfer_in(&mut tx, amount, reference_id, savings.account_id)
            .await?;
        let record = self
            .transfers
            .create_transfer_in(&mut tx, amount, reference_id, savings.account_id)
            .await?;

        tx.commit().await?;
        Ok(record)
    }

    /// Move funds from the savings account back to its reference checking
    /// account. The sufficiency check and the ledger write share one unit
    /// of work; failures are reported as `WithdrawalFailed`.
    pub async fn withdraw_savings(
        &self,
        savings_id: Uuid,
        amount: Decimal,
    ) -> EngineResult<TransactionRecord> {
        match self.withdraw_savings_inner(savings_id, amount).await {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(%savings_id, amount = %amount, error = %e, "savings withdrawal failed");
                Err(EngineError::WithdrawalFailed(Box::new(e)))
            }
        }
    }

    async fn withdraw_savings_inner(
        &self,
        savings_id: Uuid,
        amount: Decimal,
    ) -> EngineResult<TransactionRecord> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "withdrawal amount must be greater than zero (got {amount})"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let (savings, reference_id) = resolve_savings(&mut tx, savings_id).await?;

        let balance = ledger::balance_for(&mut *tx, &savings).await?;
        if amount > balance {
            return Err(EngineError::InsufficientFunds {
                balance,
                requested: amount,
            });
        }

        let record = self
            .transfers
            .create_transfer_in(&mut tx, amount, savings.account_id, reference_id)
            .await?;

        tx.commit().await?;
        Ok(record)
    }

    /// ATM pre-checks: the account must exist, be a checking account, match
    /// the PIN exactly, and pass the overdraft rule for the requested
    /// amount. Records nothing.
    pub async fn validate_account_for_atm(
        &self,
        amount: Decimal,
        account_id: Uuid,
        pin: &str,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        self.validate_atm_in(&mut tx, amount, account_id, pin).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Dispense cash: validate and record the ATM entry (no receiving
    /// account on our books) in one unit of work.
    pub async fn withdraw_atm(
        &self,
        account_id: Uuid,
        amount: Decimal,
        pin: &str,
        atm_id: Uuid,
    ) -> EngineResult<TransactionRecord> {
        match self.withdraw_atm_inner(account_id, amount, pin, atm_id).await {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(%account_id, %atm_id, amount = %amount, error = %e, "atm withdrawal failed");
                Err(EngineError::WithdrawalFailed(Box::new(e)))
            }
        }
    }

    async fn withdraw_atm_inner(
        &self,
        account_id: Uuid,
        amount: Decimal,
        pin: &str,
        atm_id: Uuid,
    ) -> EngineResult<TransactionRecord> {
        let mut tx = self.pool.begin().await?;

        self.validate_atm_in(&mut tx, amount, account_id, pin).await?;
        let record = self
            .ledger
            .record(&mut tx, &NewTransaction::atm_withdrawal(amount, account_id, atm_id))
            .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn validate_atm_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        amount: Decimal,
        account_id: Uuid,
        pin: &str,
    ) -> EngineResult<()> {
        let account = registry::fetch_account_locked(tx, account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;

        let AccountDetails::Checking { .. } = account.details else {
            return Err(EngineError::NotCheckingAccount(account_id));
        };

        if !account.verify_pin(pin) {
            return Err(EngineError::InvalidPin);
        }

        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "withdrawal amount must be greater than zero (got {amount})"
            )));
        }

        let balance = ledger::balance_for(&mut **tx, &account).await?;
        check_overdraft(balance, amount, self.transfers.overdraft_limit())
    }
}

/// Resolve a savings account and its reference checking account id inside
/// the caller's transaction. The savings row is locked: withdrawals debit it.
async fn resolve_savings(
    tx: &mut Transaction<'_, Postgres>,
    savings_id: Uuid,
) -> EngineResult<(Account, Uuid)> {
    let account = registry::fetch_account_locked(tx, savings_id)
        .await?
        .ok_or(EngineError::AccountNotFound(savings_id))?;

    if account.kind() != AccountKind::Savings {
        return Err(EngineError::AccountNotFound(savings_id));
    }

    let reference_id = account
        .reference_account_id()
        .ok_or(EngineError::AccountNotFound(savings_id))?;

    registry::fetch_account(&mut **tx, reference_id)
        .await?
        .ok_or(EngineError::AccountNotFound(reference_id))?;

    Ok((account, reference_id))
}
