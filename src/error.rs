//! Error handling module
//!
//! The engine-wide error taxonomy. Validation and insufficiency errors are
//! expected at call sites and rendered as user messages by the consuming
//! view layer; `RogueTransaction` and `Configuration` indicate defects and
//! must be logged, never swallowed. Compound operations (deposit, withdraw,
//! buy, sell) wrap their root cause in an operation-specific variant after
//! the unit of work has been rolled back.

use rust_decimal::Decimal;
use uuid::Uuid;

/// Engine-wide Result type
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // Validation errors
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Account {0} is not a checking account")]
    NotCheckingAccount(Uuid),

    #[error("Invalid PIN")]
    InvalidPin,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Insufficiency errors
    #[error("Overdraft limit exceeded: balance {balance}, requested {requested}")]
    OverdraftExceeded {
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient inventory of stock {stock_id}: available {available}, requested {requested}")]
    InsufficientInventory {
        stock_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("Insufficient holdings of stock {stock_id}: owned {owned}, requested {requested}")]
    InsufficientHoldings {
        stock_id: Uuid,
        owned: i32,
        requested: i32,
    },

    #[error("Stock not found: {0}")]
    StockNotFound(String),

    #[error("Invalid timeframe '{0}'. Valid options are '30_days', '60_days', or 'all_time'")]
    UnknownTimeframe(String),

    // Defects
    #[error("Transaction {transaction_id} references neither side of account {account_id}")]
    RogueTransaction {
        transaction_id: Uuid,
        account_id: Uuid,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Upstream unavailable; the caller may retry later
    #[error("Failed to fetch stock price for {symbol}: {reason}")]
    PriceFetchFailed { symbol: String, reason: String },

    // Compound-operation wrappers; the unit of work was rolled back before
    // these are raised
    #[error("Deposit failed: {0}")]
    DepositFailed(#[source] Box<EngineError>),

    #[error("Withdrawal failed: {0}")]
    WithdrawalFailed(#[source] Box<EngineError>),

    #[error("Stock purchase failed: {0}")]
    StockPurchaseFailed(#[source] Box<EngineError>),

    #[error("Stock sale failed: {0}")]
    StockSaleFailed(#[source] Box<EngineError>),

    // Storage layer failure
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl EngineError {
    /// Check if this is a client error (user's fault), renderable as a
    /// user-facing message.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::AccountNotFound(_)
            | Self::NotCheckingAccount(_)
            | Self::InvalidPin
            | Self::InvalidAmount(_)
            | Self::OverdraftExceeded { .. }
            | Self::InsufficientFunds { .. }
            | Self::InsufficientInventory { .. }
            | Self::InsufficientHoldings { .. }
            | Self::StockNotFound(_)
            | Self::UnknownTimeframe(_) => true,
            Self::DepositFailed(cause)
            | Self::WithdrawalFailed(cause)
            | Self::StockPurchaseFailed(cause)
            | Self::StockSaleFailed(cause) => cause.is_client_error(),
            _ => false,
        }
    }

    /// Check if this indicates a defect (data integrity or setup problem)
    /// that should be alerted on rather than shown to a user.
    pub fn is_defect(&self) -> bool {
        match self {
            Self::RogueTransaction { .. } | Self::Configuration(_) => true,
            Self::DepositFailed(cause)
            | Self::WithdrawalFailed(cause)
            | Self::StockPurchaseFailed(cause)
            | Self::StockSaleFailed(cause) => cause.is_defect(),
            _ => false,
        }
    }

    /// Unwrap compound-operation wrappers down to the root cause.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            Self::DepositFailed(cause)
            | Self::WithdrawalFailed(cause)
            | Self::StockPurchaseFailed(cause)
            | Self::StockSaleFailed(cause) => cause.root_cause(),
            other => other,
        }
    }
}
