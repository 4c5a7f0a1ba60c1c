//! Account Registry
//!
//! Lookup and administrative lifecycle for the three account kinds. All
//! kinds live in one keyed store with a `kind` discriminant; `get_account`
//! returning `None` means "not found" and is not an error. The bank custody
//! account is a setup precondition: its absence is a configuration defect,
//! not a per-request failure.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::decode_err;
use crate::domain::{hash_pin, Account, AccountDetails, AccountKind};
use crate::error::{EngineError, EngineResult};

type AccountRow = (
    Uuid,
    String,
    Decimal,
    Option<Uuid>,
    Option<String>,
    bool,
    Option<Uuid>,
    bool,
);

const ACCOUNT_COLUMNS: &str = "account_id, kind, opening_balance, owner_id, \
                               pin_hash, overdraft_allowed, reference_account_id, is_bank";

fn account_from_row(row: AccountRow) -> Result<Account, sqlx::Error> {
    let (account_id, kind, opening_balance, owner_id, pin_hash, overdraft_allowed, reference, is_bank) =
        row;

    let details = match kind.as_str() {
        "checking" => AccountDetails::Checking {
            pin_hash: pin_hash.ok_or_else(|| decode_err("checking account missing pin hash"))?,
            overdraft_allowed,
        },
        "savings" => AccountDetails::Savings {
            reference_account_id: reference
                .ok_or_else(|| decode_err("savings account missing reference account"))?,
        },
        "custody" => AccountDetails::Custody {
            reference_account_id: reference
                .ok_or_else(|| decode_err("custody account missing reference account"))?,
            is_bank,
        },
        other => return Err(decode_err(&format!("unknown account kind '{other}'"))),
    };

    Ok(Account {
        account_id,
        opening_balance,
        owner_id,
        details,
    })
}

/// Fetch an account by id on any executor.
pub(crate) async fn fetch_account<'e, E>(
    executor: E,
    account_id: Uuid,
) -> Result<Option<Account>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row: Option<AccountRow> = sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1"
    ))
    .bind(account_id)
    .fetch_optional(executor)
    .await?;

    row.map(account_from_row).transpose()
}

/// Fetch an account by id with a row lock, serializing concurrent units of
/// work that are about to debit it.
pub(crate) async fn fetch_account_locked(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<Option<Account>, sqlx::Error> {
    let row: Option<AccountRow> = sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1 FOR UPDATE"
    ))
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(account_from_row).transpose()
}

/// Fetch the bank custody account on any executor.
pub(crate) async fn fetch_bank_custody<'e, E>(executor: E) -> EngineResult<Account>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row: Option<AccountRow> = sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE kind = 'custody' AND is_bank"
    ))
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => Ok(account_from_row(row)?),
        None => {
            tracing::error!("bank custody account is not configured");
            Err(EngineError::Configuration(
                "bank custody account not found".to_string(),
            ))
        }
    }
}

/// Account lookup and administrative lifecycle.
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    pool: PgPool,
}

impl AccountRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve an account of any kind. `None` means not found.
    pub async fn get_account(&self, account_id: Uuid) -> EngineResult<Option<Account>> {
        Ok(fetch_account(&self.pool, account_id).await?)
    }

    /// The distinguished custody account acting as market counterparty.
    /// Its absence is a fatal setup problem.
    pub async fn get_bank_custody_account(&self) -> EngineResult<Account> {
        fetch_bank_custody(&self.pool).await
    }

    /// All accounts, of any kind, belonging to an owner.
    pub async fn accounts_by_owner(&self, owner_id: Uuid) -> EngineResult<Vec<Account>> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner_id = $1 ORDER BY kind"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(account_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Open a checking account.
    pub async fn create_checking(
        &self,
        owner_id: Option<Uuid>,
        opening_balance: Decimal,
        pin: &str,
        overdraft_allowed: bool,
    ) -> EngineResult<Account> {
        let account_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, kind, opening_balance, owner_id,
                                  pin_hash, overdraft_allowed)
            VALUES ($1, 'checking', $2, $3, $4, $5)
            "#,
        )
        .bind(account_id)
        .bind(opening_balance)
        .bind(owner_id)
        .bind(hash_pin(pin))
        .bind(overdraft_allowed)
        .execute(&self.pool)
        .await?;

        tracing::info!(%account_id, "checking account opened");

        Ok(Account {
            account_id,
            opening_balance,
            owner_id,
            details: AccountDetails::Checking {
                pin_hash: hash_pin(pin),
                overdraft_allowed,
            },
        })
    }

    /// Open a savings account settling through an existing checking account.
    pub async fn create_savings(
        &self,
        owner_id: Option<Uuid>,
        opening_balance: Decimal,
        reference_account_id: Uuid,
    ) -> EngineResult<Account> {
        self.require_checking(reference_account_id).await?;

        let account_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, kind, opening_balance, owner_id,
                                  reference_account_id)
            VALUES ($1, 'savings', $2, $3, $4)
            "#,
        )
        .bind(account_id)
        .bind(opening_balance)
        .bind(owner_id)
        .bind(reference_account_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(%account_id, %reference_account_id, "savings account opened");

        Ok(Account {
            account_id,
            opening_balance,
            owner_id,
            details: AccountDetails::Savings {
                reference_account_id,
            },
        })
    }

    /// Open a customer custody account settling through an existing
    /// checking account.
    pub async fn create_custody(
        &self,
        owner_id: Option<Uuid>,
        reference_account_id: Uuid,
    ) -> EngineResult<Account> {
        self.insert_custody(owner_id, reference_account_id, false)
            .await
    }

    /// Seed the bank's own custody account. It has no owning customer and
    /// acts as counterparty for all customer stock trades; at most one may
    /// exist (enforced by a partial unique index).
    pub async fn create_bank_custody(&self, reference_account_id: Uuid) -> EngineResult<Account> {
        self.insert_custody(None, reference_account_id, true).await
    }

    async fn insert_custody(
        &self,
        owner_id: Option<Uuid>,
        reference_account_id: Uuid,
        is_bank: bool,
    ) -> EngineResult<Account> {
        self.require_checking(reference_account_id).await?;

        let account_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, kind, opening_balance, owner_id,
                                  reference_account_id, is_bank)
            VALUES ($1, 'custody', 0, $2, $3, $4)
            "#,
        )
        .bind(account_id)
        .bind(owner_id)
        .bind(reference_account_id)
        .bind(is_bank)
        .execute(&self.pool)
        .await?;

        tracing::info!(%account_id, %reference_account_id, is_bank, "custody account opened");

        Ok(Account {
            account_id,
            opening_balance: Decimal::ZERO,
            owner_id,
            details: AccountDetails::Custody {
                reference_account_id,
                is_bank,
            },
        })
    }

    /// Close a checking account. Savings and custody accounts referencing
    /// it are deleted by the schema's cascade rule.
    pub async fn delete_checking(&self, account_id: Uuid) -> EngineResult<()> {
        let account = fetch_account(&self.pool, account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;
        if !account.is_checking() {
            return Err(EngineError::NotCheckingAccount(account_id));
        }

        sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(%account_id, "checking account deleted (dependents cascaded)");
        Ok(())
    }

    async fn require_checking(&self, account_id: Uuid) -> EngineResult<()> {
        let account = fetch_account(&self.pool, account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;
        if !account.is_checking() {
            return Err(EngineError::NotCheckingAccount(account_id));
        }
        Ok(())
    }
}
