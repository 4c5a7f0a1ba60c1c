//! Ledger Store
//!
//! Append-only persistence for ledger entries. Entries are recorded inside
//! the caller's transaction so that compound operations commit or roll back
//! as one unit of work. History reads are a fresh query per call, filtered
//! by timeframe and ordered by date descending; nothing is cached.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::decode_err;
use crate::domain::{
    NewTransaction, Timeframe, TradeSide, TransactionEntry, TransactionRecord,
};
use crate::error::EngineResult;

/// Event log of every movement of money in the system.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: PgPool,
}

type TransactionRow = (
    Uuid,
    String,
    Decimal,
    DateTime<Utc>,
    Option<Uuid>,
    Option<Uuid>,
    Option<Uuid>,
    Option<i32>,
    Option<String>,
    Option<Uuid>,
);

fn record_from_row(row: TransactionRow) -> Result<TransactionRecord, sqlx::Error> {
    let (
        transaction_id,
        kind,
        amount,
        date,
        sending_account_id,
        receiving_account_id,
        stock_id,
        quantity,
        trade_side,
        atm_id,
    ) = row;

    let entry = match kind.as_str() {
        "transfer" => TransactionEntry::Transfer,
        "stock" => TransactionEntry::Stock {
            stock_id: stock_id.ok_or_else(|| decode_err("stock entry missing stock_id"))?,
            quantity: quantity.ok_or_else(|| decode_err("stock entry missing quantity"))?,
            side: trade_side
                .as_deref()
                .and_then(TradeSide::parse)
                .ok_or_else(|| decode_err("stock entry missing trade side"))?,
        },
        "atm" => TransactionEntry::Atm {
            atm_id: atm_id.ok_or_else(|| decode_err("atm entry missing atm_id"))?,
        },
        other => return Err(decode_err(&format!("unknown transaction kind '{other}'"))),
    };

    Ok(TransactionRecord {
        transaction_id,
        amount,
        date,
        sending_account_id,
        receiving_account_id,
        entry,
    })
}

/// Fetch every entry where the account is sender or receiver, newest first,
/// bounded below by the timeframe. Generic over the executor so the same
/// query serves both pool reads and in-transaction sufficiency checks.
pub(crate) async fn fetch_history<'e, E>(
    executor: E,
    account_id: Uuid,
    timeframe: Timeframe,
) -> Result<Vec<TransactionRecord>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let since = timeframe.lower_bound(Utc::now());

    let rows: Vec<TransactionRow> = sqlx::query_as(
        r#"
        SELECT transaction_id, kind, amount, date,
               sending_account_id, receiving_account_id,
               stock_id, quantity, trade_side, atm_id
        FROM transactions
        WHERE (sending_account_id = $1 OR receiving_account_id = $1)
          AND ($2::timestamptz IS NULL OR date >= $2::timestamptz)
        ORDER BY date DESC
        "#,
    )
    .bind(account_id)
    .bind(since)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(record_from_row).collect()
}

impl LedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an immutable entry inside the caller's unit of work.
    pub async fn record(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: &NewTransaction,
    ) -> EngineResult<TransactionRecord> {
        let (stock_id, quantity, trade_side) = match &new.entry {
            TransactionEntry::Stock {
                stock_id,
                quantity,
                side,
            } => (Some(*stock_id), Some(*quantity), Some(side.as_str())),
            _ => (None, None, None),
        };
        let atm_id = match &new.entry {
            TransactionEntry::Atm { atm_id } => Some(*atm_id),
            _ => None,
        };

        let transaction_id = Uuid::new_v4();
        let date: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                transaction_id, kind, amount, date,
                sending_account_id, receiving_account_id,
                stock_id, quantity, trade_side, atm_id
            )
            VALUES ($1, $2, $3, NOW(), $4, $5, $6, $7, $8, $9)
            RETURNING date
            "#,
        )
        .bind(transaction_id)
        .bind(new.entry.kind_str())
        .bind(new.amount)
        .bind(new.sending_account_id)
        .bind(new.receiving_account_id)
        .bind(stock_id)
        .bind(quantity)
        .bind(trade_side)
        .bind(atm_id)
        .fetch_one(&mut **tx)
        .await?;

        tracing::debug!(
            %transaction_id,
            kind = new.entry.kind_str(),
            amount = %new.amount,
            "ledger entry recorded"
        );

        Ok(TransactionRecord {
            transaction_id,
            amount: new.amount,
            date,
            sending_account_id: new.sending_account_id,
            receiving_account_id: new.receiving_account_id,
            entry: new.entry.clone(),
        })
    }

    /// All entries touching the account within the timeframe, newest first.
    pub async fn history(
        &self,
        account_id: Uuid,
        timeframe: Timeframe,
    ) -> EngineResult<Vec<TransactionRecord>> {
        Ok(fetch_history(&self.pool, account_id, timeframe).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_row() -> TransactionRow {
        (
            Uuid::new_v4(),
            "transfer".to_string(),
            dec!(100.00),
            Utc::now(),
            Some(Uuid::new_v4()),
            Some(Uuid::new_v4()),
            None,
            None,
            None,
            None,
        )
    }

    #[test]
    fn test_transfer_row_decodes() {
        let record = record_from_row(base_row()).unwrap();
        assert_eq!(record.entry, TransactionEntry::Transfer);
        assert_eq!(record.amount, dec!(100.00));
    }

    #[test]
    fn test_stock_row_decodes() {
        let stock_id = Uuid::new_v4();
        let mut row = base_row();
        row.1 = "stock".to_string();
        row.6 = Some(stock_id);
        row.7 = Some(5);
        row.8 = Some("sell".to_string());
        let record = record_from_row(row).unwrap();
        assert_eq!(
            record.entry,
            TransactionEntry::Stock {
                stock_id,
                quantity: 5,
                side: TradeSide::Sell,
            }
        );
    }

    #[test]
    fn test_stock_row_missing_payload_rejected() {
        let mut row = base_row();
        row.1 = "stock".to_string();
        assert!(record_from_row(row).is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut row = base_row();
        row.1 = "wire".to_string();
        assert!(record_from_row(row).is_err());
    }
}
