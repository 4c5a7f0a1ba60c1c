//! corebank demo seed
//!
//! Applies the schema and seeds the fixed institutional setup the engine
//! expects: the bank's settlement checking account, the bank custody
//! account holding tradable inventory, a handful of listed stocks, and one
//! demo customer with a checking, savings and custody account. Safe to run
//! repeatedly; a database that already has the bank custody account is left
//! alone.

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::Executor;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use corebank::{
    db, AccountRegistry, Config, LedgerStore, StaticMarketData, TradingEngine, TransferEngine,
};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corebank=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    db::verify_connection(&pool).await?;
    tracing::info!("database connection verified");

    pool.execute(include_str!("../../migrations/0001_initial.sql"))
        .await?;
    tracing::info!("schema applied");

    let already_seeded: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM accounts WHERE kind = 'custody' AND is_bank)",
    )
    .fetch_one(&pool)
    .await?;
    if already_seeded {
        tracing::info!("bank custody account already present, nothing to seed");
        return Ok(());
    }

    let registry = AccountRegistry::new(pool.clone());
    let ledger = LedgerStore::new(pool.clone());
    let transfers = TransferEngine::new(pool.clone(), ledger.clone(), config.overdraft_limit);

    let market = Arc::new(
        StaticMarketData::new()
            .with_price("ACME", "135.20".parse::<Decimal>()?)
            .with_price("GLOBEX", "78.45".parse::<Decimal>()?)
            .with_price("INITECH", "12.90".parse::<Decimal>()?),
    );
    let trading = TradingEngine::new(
        pool.clone(),
        transfers,
        ledger,
        market,
        config.price_max_age_secs,
    );

    // Institutional accounts: the settlement checking account funds every
    // customer sale, so it starts deep in the black.
    let bank_checking = registry
        .create_checking(None, "1000000.00".parse()?, "0000", true)
        .await?;
    let bank_custody = registry.create_bank_custody(bank_checking.account_id).await?;
    tracing::info!(
        bank_checking = %bank_checking.account_id,
        bank_custody = %bank_custody.account_id,
        "institutional accounts seeded"
    );

    // Listed stocks and the bank's tradable inventory
    for (symbol, name, price, inventory) in [
        ("ACME", "Acme Corporation", "135.20", 500),
        ("GLOBEX", "Globex International", "78.45", 800),
        ("INITECH", "Initech Systems", "12.90", 2000),
    ] {
        let stock = trading
            .create_stock(symbol, name, price.parse::<Decimal>()?)
            .await?;
        trading
            .set_inventory(bank_custody.account_id, stock.stock_id, inventory)
            .await?;
        tracing::info!(symbol, inventory, "stock listed and inventoried");
    }

    // One demo customer with the full account set
    let owner_id = Uuid::new_v4();
    let checking = registry
        .create_checking(Some(owner_id), "1000.00".parse()?, "1234", true)
        .await?;
    let savings = registry
        .create_savings(Some(owner_id), "500.00".parse()?, checking.account_id)
        .await?;
    let custody = registry
        .create_custody(Some(owner_id), checking.account_id)
        .await?;
    tracing::info!(
        %owner_id,
        checking = %checking.account_id,
        savings = %savings.account_id,
        custody = %custody.account_id,
        "demo customer seeded (checking PIN 1234)"
    );

    if !db::check_schema(&pool).await? {
        anyhow::bail!("schema verification failed after seeding");
    }
    tracing::info!("seed complete");

    Ok(())
}
