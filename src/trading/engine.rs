//! Stock Trading Engine
//!
//! Trades move securities between a customer custody account and the bank
//! custody account while cash settles between their reference checking
//! accounts through the Transaction Engine. Every trade is one database
//! transaction: price refresh, fund transfer, inventory check, ledger write
//! and ownership adjustment commit together or not at all. Quantities that
//! are compared and then mutated (bank inventory, customer holdings, the
//! cached price row) are read under `FOR UPDATE`.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    round_cents, Account, AccountDetails, Holding, NewTransaction, Stock, StockListing, TradeSide,
};
use crate::error::{EngineError, EngineResult};
use crate::ledger::LedgerStore;
use crate::registry;
use crate::transfer::TransferEngine;

use super::market::MarketData;

/// Customer-facing stock trading against the bank's custody inventory.
#[derive(Clone)]
pub struct TradingEngine {
    pool: PgPool,
    transfers: TransferEngine,
    ledger: LedgerStore,
    market: Arc<dyn MarketData>,
    price_max_age: Duration,
}

impl TradingEngine {
    pub fn new(
        pool: PgPool,
        transfers: TransferEngine,
        ledger: LedgerStore,
        market: Arc<dyn MarketData>,
        price_max_age_secs: i64,
    ) -> Self {
        Self {
            pool,
            transfers,
            ledger,
            market,
            price_max_age: Duration::seconds(price_max_age_secs),
        }
    }

    /// Current price for a symbol, refreshed from the market-data provider
    /// when the cached value is older than the staleness window. A provider
    /// failure fails the read and leaves the stale row untouched.
    pub async fn price(&self, symbol: &str) -> EngineResult<Decimal> {
        let mut tx = self.pool.begin().await?;
        let price = self.refreshed_price_in(&mut tx, symbol).await?;
        tx.commit().await?;
        Ok(price)
    }

    /// Price lookup/refresh inside the caller's unit of work. The stock row
    /// is locked so concurrent refreshes of the same symbol serialize.
    async fn refreshed_price_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        symbol: &str,
    ) -> EngineResult<Decimal> {
        let row: Option<(Uuid, Decimal, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT stock_id, current_price, last_price_update
            FROM stocks WHERE symbol = $1
            FOR UPDATE
            "#,
        )
        .bind(symbol)
        .fetch_optional(&mut **tx)
        .await?;

        let (stock_id, current_price, last_update) =
            row.ok_or_else(|| EngineError::StockNotFound(symbol.to_string()))?;

        if Utc::now() - last_update <= self.price_max_age {
            return Ok(current_price);
        }

        let fresh = self.market.last_price(symbol).await.map_err(|e| {
            tracing::warn!(symbol, error = %e, "market data fetch failed");
            EngineError::PriceFetchFailed {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }
        })?;
        let fresh = round_cents(fresh);

        sqlx::query(
            "UPDATE stocks SET current_price = $2, last_price_update = NOW() WHERE stock_id = $1",
        )
        .bind(stock_id)
        .bind(fresh)
        .execute(&mut **tx)
        .await?;

        tracing::debug!(symbol, price = %fresh, "stock price refreshed");
        Ok(fresh)
    }

    /// A stock by id.
    pub async fn stock(&self, stock_id: Uuid) -> EngineResult<Stock> {
        let row: Option<(Uuid, String, String, Decimal, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT stock_id, symbol, name, current_price, last_price_update
            FROM stocks WHERE stock_id = $1
            "#,
        )
        .bind(stock_id)
        .fetch_optional(&self.pool)
        .await?;

        let (stock_id, symbol, name, current_price, last_price_update) =
            row.ok_or_else(|| EngineError::StockNotFound(stock_id.to_string()))?;

        Ok(Stock {
            stock_id,
            symbol,
            name,
            current_price,
            last_price_update,
        })
    }

    /// Every holding of the account, valued at the cached price.
    pub async fn portfolio(&self, account_id: Uuid) -> EngineResult<Vec<Holding>> {
        registry::fetch_account(&self.pool, account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;

        let rows: Vec<(Uuid, String, String, i32, Decimal)> = sqlx::query_as(
            r#"
            SELECT s.stock_id, s.symbol, s.name, o.quantity, s.current_price
            FROM stock_ownerships o
            JOIN stocks s ON s.stock_id = o.stock_id
            WHERE o.account_id = $1
            ORDER BY s.symbol
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(stock_id, symbol, name, quantity, price)| {
                Holding::new(stock_id, symbol, name, quantity, price)
            })
            .collect())
    }

    /// Total cached value of the account's holdings.
    pub async fn portfolio_value(&self, account_id: Uuid) -> EngineResult<Decimal> {
        let total = self
            .portfolio(account_id)
            .await?
            .iter()
            .map(|h| h.total_value)
            .sum();
        Ok(round_cents(total))
    }

    /// The bank custody account's holdings, offered as tradable inventory.
    pub async fn available_stocks(&self) -> EngineResult<Vec<StockListing>> {
        let bank = registry::fetch_bank_custody(&self.pool).await?;

        let rows: Vec<(Uuid, String, String, Decimal, i32)> = sqlx::query_as(
            r#"
            SELECT s.stock_id, s.symbol, s.name, s.current_price, o.quantity
            FROM stock_ownerships o
            JOIN stocks s ON s.stock_id = o.stock_id
            WHERE o.account_id = $1
            ORDER BY s.symbol
            "#,
        )
        .bind(bank.account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(stock_id, symbol, name, current_price, available)| StockListing {
                    stock_id,
                    symbol,
                    name,
                    current_price,
                    available,
                },
            )
            .collect())
    }

    /// Buy `quantity` shares from the bank's inventory. Cash moves from the
    /// customer's reference checking account to the bank's; the shares move
    /// the other way. Any failure rolls the whole trade back and surfaces
    /// as `StockPurchaseFailed`.
    pub async fn buy(&self, account_id: Uuid, stock_id: Uuid, quantity: i32) -> EngineResult<()> {
        match self.buy_inner(account_id, stock_id, quantity).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(%account_id, %stock_id, quantity, error = %e, "stock purchase failed");
                Err(EngineError::StockPurchaseFailed(Box::new(e)))
            }
        }
    }

    async fn buy_inner(&self, account_id: Uuid, stock_id: Uuid, quantity: i32) -> EngineResult<()> {
        if quantity <= 0 {
            return Err(EngineError::InvalidAmount(format!(
                "quantity must be greater than zero (got {quantity})"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let (custody, customer_checking_id) = resolve_custody(&mut tx, account_id).await?;
        let bank = registry::fetch_bank_custody(&mut *tx).await?;
        let bank_checking_id = bank.reference_account_id().ok_or_else(|| {
            EngineError::Configuration("bank custody account has no reference account".to_string())
        })?;

        let symbol = stock_symbol(&mut tx, stock_id).await?;
        let price = self.refreshed_price_in(&mut tx, &symbol).await?;
        let total_cost = round_cents(price * Decimal::from(quantity));

        // Cash: customer checking -> bank settlement account, with the full
        // transfer validation including the overdraft rule
        self.transfers
            .validate_transfer_in(&mut tx, total_cost, customer_checking_id, bank_checking_id)
            .await?;
        self.transfers
            .create_transfer_in(&mut tx, total_cost, customer_checking_id, bank_checking_id)
            .await?;

        // Inventory under lock so concurrent buys cannot both pass
        let available = locked_shares(&mut tx, bank.account_id, stock_id).await?;
        if available < quantity {
            return Err(EngineError::InsufficientInventory {
                stock_id,
                available,
                requested: quantity,
            });
        }

        // Securities: bank custody -> customer custody
        self.ledger
            .record(
                &mut tx,
                &NewTransaction::stock(
                    total_cost,
                    bank.account_id,
                    custody.account_id,
                    stock_id,
                    quantity,
                    TradeSide::Buy,
                ),
            )
            .await?;

        remove_shares(&mut tx, bank.account_id, stock_id, quantity, available).await?;
        add_shares(&mut tx, custody.account_id, stock_id, quantity).await?;

        tx.commit().await?;

        tracing::debug!(
            %account_id, %stock_id, quantity, total_cost = %total_cost,
            "stock purchase settled"
        );
        Ok(())
    }

    /// Sell `quantity` shares back to the bank. Symmetric to `buy`;
    /// failures surface as `StockSaleFailed`.
    pub async fn sell(&self, account_id: Uuid, stock_id: Uuid, quantity: i32) -> EngineResult<()> {
        match self.sell_inner(account_id, stock_id, quantity).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(%account_id, %stock_id, quantity, error = %e, "stock sale failed");
                Err(EngineError::StockSaleFailed(Box::new(e)))
            }
        }
    }

    async fn sell_inner(&self, account_id: Uuid, stock_id: Uuid, quantity: i32) -> EngineResult<()> {
        if quantity <= 0 {
            return Err(EngineError::InvalidAmount(format!(
                "quantity must be greater than zero (got {quantity})"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let (custody, customer_checking_id) = resolve_custody(&mut tx, account_id).await?;
        let bank = registry::fetch_bank_custody(&mut *tx).await?;
        let bank_checking_id = bank.reference_account_id().ok_or_else(|| {
            EngineError::Configuration("bank custody account has no reference account".to_string())
        })?;

        let symbol = stock_symbol(&mut tx, stock_id).await?;
        let price = self.refreshed_price_in(&mut tx, &symbol).await?;
        let total_revenue = round_cents(price * Decimal::from(quantity));

        // Holdings under lock
        let owned = locked_shares(&mut tx, custody.account_id, stock_id).await?;
        if owned < quantity {
            return Err(EngineError::InsufficientHoldings {
                stock_id,
                owned,
                requested: quantity,
            });
        }

        // Cash: bank settlement account -> customer checking
        self.transfers
            .validate_transfer_in(&mut tx, total_revenue, bank_checking_id, customer_checking_id)
            .await?;
        self.transfers
            .create_transfer_in(&mut tx, total_revenue, bank_checking_id, customer_checking_id)
            .await?;

        // Securities: customer custody -> bank custody
        self.ledger
            .record(
                &mut tx,
                &NewTransaction::stock(
                    total_revenue,
                    custody.account_id,
                    bank.account_id,
                    stock_id,
                    quantity,
                    TradeSide::Sell,
                ),
            )
            .await?;

        add_shares(&mut tx, bank.account_id, stock_id, quantity).await?;
        remove_shares(&mut tx, custody.account_id, stock_id, quantity, owned).await?;

        tx.commit().await?;

        tracing::debug!(
            %account_id, %stock_id, quantity, total_revenue = %total_revenue,
            "stock sale settled"
        );
        Ok(())
    }

    /// Administratively list a stock with an initial cached price.
    pub async fn create_stock(
        &self,
        symbol: &str,
        name: &str,
        price: Decimal,
    ) -> EngineResult<Stock> {
        let stock_id = Uuid::new_v4();
        let price = round_cents(price);
        let last_price_update: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO stocks (stock_id, symbol, name, current_price, last_price_update)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING last_price_update
            "#,
        )
        .bind(stock_id)
        .bind(symbol)
        .bind(name)
        .bind(price)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(%stock_id, symbol, "stock listed");

        Ok(Stock {
            stock_id,
            symbol: symbol.to_string(),
            name: name.to_string(),
            current_price: price,
            last_price_update,
        })
    }

    /// Administratively set an account's holding of a stock to an exact
    /// quantity (custody seeding). Setting 0 deletes the row.
    pub async fn set_inventory(
        &self,
        account_id: Uuid,
        stock_id: Uuid,
        quantity: i32,
    ) -> EngineResult<()> {
        if quantity < 0 {
            return Err(EngineError::InvalidAmount(format!(
                "inventory quantity must not be negative (got {quantity})"
            )));
        }

        if quantity == 0 {
            sqlx::query("DELETE FROM stock_ownerships WHERE account_id = $1 AND stock_id = $2")
                .bind(account_id)
                .bind(stock_id)
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO stock_ownerships (account_id, stock_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id, stock_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(account_id)
        .bind(stock_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Resolve a customer custody account and its reference checking account.
async fn resolve_custody(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> EngineResult<(Account, Uuid)> {
    let account = registry::fetch_account(&mut **tx, account_id)
        .await?
        .ok_or(EngineError::AccountNotFound(account_id))?;

    let AccountDetails::Custody {
        reference_account_id,
        ..
    } = &account.details
    else {
        return Err(EngineError::AccountNotFound(account_id));
    };
    let reference_account_id = *reference_account_id;

    Ok((account, reference_account_id))
}

async fn stock_symbol(tx: &mut Transaction<'_, Postgres>, stock_id: Uuid) -> EngineResult<String> {
    let symbol: Option<String> = sqlx::query_scalar("SELECT symbol FROM stocks WHERE stock_id = $1")
        .bind(stock_id)
        .fetch_optional(&mut **tx)
        .await?;

    symbol.ok_or_else(|| EngineError::StockNotFound(stock_id.to_string()))
}

/// Current holding quantity under a row lock; 0 when no row exists.
async fn locked_shares(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    stock_id: Uuid,
) -> Result<i32, sqlx::Error> {
    let quantity: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT quantity FROM stock_ownerships
        WHERE account_id = $1 AND stock_id = $2
        FOR UPDATE
        "#,
    )
    .bind(account_id)
    .bind(stock_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(quantity.unwrap_or(0))
}

/// Remove shares from a holding the caller has already locked and checked.
/// A holding that reaches 0 is deleted, never retained.
async fn remove_shares(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    stock_id: Uuid,
    quantity: i32,
    held: i32,
) -> Result<(), sqlx::Error> {
    if held == quantity {
        sqlx::query("DELETE FROM stock_ownerships WHERE account_id = $1 AND stock_id = $2")
            .bind(account_id)
            .bind(stock_id)
            .execute(&mut **tx)
            .await?;
    } else {
        sqlx::query(
            r#"
            UPDATE stock_ownerships SET quantity = quantity - $3
            WHERE account_id = $1 AND stock_id = $2
            "#,
        )
        .bind(account_id)
        .bind(stock_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Add shares to a holding, creating the row when absent.
async fn add_shares(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    stock_id: Uuid,
    quantity: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stock_ownerships (account_id, stock_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (account_id, stock_id)
        DO UPDATE SET quantity = stock_ownerships.quantity + EXCLUDED.quantity
        "#,
    )
    .bind(account_id)
    .bind(stock_id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
