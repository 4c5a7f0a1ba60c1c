//! Common test utilities
#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use corebank::{
    AccountRegistry, AccountService, Balances, LedgerStore, StaticMarketData, TradingEngine,
    TransferEngine,
};

pub fn overdraft_limit() -> Decimal {
    dec!(1000.00)
}

/// Connect to the test database and apply the schema. Returns `None` when
/// DATABASE_URL is not set so the suite degrades to a no-op instead of
/// failing on machines without Postgres.
pub async fn try_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    pool.execute(include_str!("../../migrations/0001_initial.sql"))
        .await
        .expect("Failed to apply schema");

    Some(pool)
}

/// The full engine stack wired against one pool, with the singleton bank
/// accounts resolved. Tests create their own customer accounts with fresh
/// ids rather than truncating shared state.
pub struct TestBank {
    pub pool: PgPool,
    pub registry: AccountRegistry,
    pub ledger: LedgerStore,
    pub balances: Balances,
    pub transfers: TransferEngine,
    pub accounts: AccountService,
    pub bank_checking_id: Uuid,
    pub bank_custody_id: Uuid,
}

impl TestBank {
    pub async fn new(pool: PgPool) -> Self {
        let registry = AccountRegistry::new(pool.clone());
        let ledger = LedgerStore::new(pool.clone());
        let balances = Balances::new(pool.clone());
        let transfers = TransferEngine::new(pool.clone(), ledger.clone(), overdraft_limit());
        let accounts = AccountService::new(pool.clone(), transfers.clone(), ledger.clone());

        let (bank_checking_id, bank_custody_id) = ensure_bank(&pool, &registry).await;

        Self {
            pool,
            registry,
            ledger,
            balances,
            transfers,
            accounts,
            bank_checking_id,
            bank_custody_id,
        }
    }

    /// A trading engine over the same pool with the given price table.
    pub fn trading(&self, market: StaticMarketData, price_max_age_secs: i64) -> TradingEngine {
        TradingEngine::new(
            self.pool.clone(),
            self.transfers.clone(),
            self.ledger.clone(),
            Arc::new(market),
            price_max_age_secs,
        )
    }

    /// A funded customer checking account with PIN "1234".
    pub async fn customer_checking(&self, opening_balance: Decimal) -> Uuid {
        self.registry
            .create_checking(Some(Uuid::new_v4()), opening_balance, "1234", true)
            .await
            .expect("Failed to open checking account")
            .account_id
    }
}

/// Get or create the singleton bank checking + custody pair. Concurrent
/// first callers race on the partial unique index; the loser re-reads.
async fn ensure_bank(pool: &PgPool, registry: &AccountRegistry) -> (Uuid, Uuid) {
    if let Some(pair) = existing_bank(pool).await {
        return pair;
    }

    let checking = registry
        .create_checking(None, dec!(10000000.00), "0000", true)
        .await
        .expect("Failed to open bank checking account");
    match registry.create_bank_custody(checking.account_id).await {
        Ok(custody) => (checking.account_id, custody.account_id),
        Err(_) => existing_bank(pool)
            .await
            .expect("Bank custody account missing after seed race"),
    }
}

async fn existing_bank(pool: &PgPool) -> Option<(Uuid, Uuid)> {
    let row: Option<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT reference_account_id, account_id FROM accounts WHERE kind = 'custody' AND is_bank",
    )
    .fetch_optional(pool)
    .await
    .expect("Failed to query bank custody account");
    row
}
