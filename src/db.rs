//! Database module
//!
//! Database connection and schema verification utilities.
//! The schema itself lives in raw SQL files under migrations/.

use sqlx::PgPool;

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let required_tables = vec!["accounts", "transactions", "stocks", "stock_ownerships"];

    for table in required_tables {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    // The bank custody account is a setup precondition for stock trading
    if !check_bank_custody_account(pool).await? {
        return Ok(false);
    }

    Ok(true)
}

/// Check that the distinguished bank custody account has been seeded
async fn check_bank_custody_account(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM accounts WHERE kind = 'custody' AND is_bank)",
    )
    .fetch_one(pool)
    .await?;

    if !exists {
        tracing::error!("Bank custody account does not exist. Please run the database seed.");
        return Ok(false);
    }

    tracing::info!("Bank custody account verified");
    Ok(true)
}

/// Decode failure for a row that violates a schema-level invariant.
pub(crate) fn decode_err(msg: &str) -> sqlx::Error {
    sqlx::Error::Decode(msg.to_string().into())
}
