//! Configuration module
//!
//! Loads configuration from environment variables.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Environment (development, production)
    pub environment: String,

    /// How far a checking-account balance may go below zero on a debit.
    /// Shared by all checking accounts.
    pub overdraft_limit: Decimal,

    /// Cached stock prices older than this are refreshed from the
    /// market-data provider before being served.
    pub price_max_age_secs: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let overdraft_limit = env::var("OVERDRAFT_LIMIT")
            .map(|v| Decimal::from_str(&v))
            .unwrap_or_else(|_| Decimal::from_str("1000.00"))
            .map_err(|_| ConfigError::InvalidValue("OVERDRAFT_LIMIT"))?;

        let price_max_age_secs = env::var("PRICE_MAX_AGE_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PRICE_MAX_AGE_SECS"))?;

        Ok(Self {
            database_url,
            database_max_connections,
            environment,
            overdraft_limit,
            price_max_age_secs,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
