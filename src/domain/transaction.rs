//! Ledger entries
//!
//! A ledger entry is immutable once recorded. Ordinary transfers carry no
//! extra payload; stock entries record the traded stock, quantity and side;
//! ATM entries record the dispensing machine. A null sending or receiving
//! side represents the external world (an ATM payout, an external deposit).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock trade, from the customer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(TradeSide::Buy),
            "sell" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// Subtype payload of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEntry {
    Transfer,
    Stock {
        stock_id: Uuid,
        quantity: i32,
        side: TradeSide,
    },
    Atm {
        atm_id: Uuid,
    },
}

impl TransactionEntry {
    pub fn kind_str(&self) -> &'static str {
        match self {
            TransactionEntry::Transfer => "transfer",
            TransactionEntry::Stock { .. } => "stock",
            TransactionEntry::Atm { .. } => "atm",
        }
    }
}

/// A persisted, immutable ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub sending_account_id: Option<Uuid>,
    pub receiving_account_id: Option<Uuid>,
    pub entry: TransactionEntry,
}

/// Parameter object for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub sending_account_id: Option<Uuid>,
    pub receiving_account_id: Option<Uuid>,
    pub entry: TransactionEntry,
}

impl NewTransaction {
    pub fn transfer(amount: Decimal, sending: Uuid, receiving: Uuid) -> Self {
        Self {
            amount,
            sending_account_id: Some(sending),
            receiving_account_id: Some(receiving),
            entry: TransactionEntry::Transfer,
        }
    }

    pub fn stock(
        amount: Decimal,
        sending: Uuid,
        receiving: Uuid,
        stock_id: Uuid,
        quantity: i32,
        side: TradeSide,
    ) -> Self {
        Self {
            amount,
            sending_account_id: Some(sending),
            receiving_account_id: Some(receiving),
            entry: TransactionEntry::Stock {
                stock_id,
                quantity,
                side,
            },
        }
    }

    /// Cash leaves the account through a machine; there is no receiving
    /// account on our books.
    pub fn atm_withdrawal(amount: Decimal, account_id: Uuid, atm_id: Uuid) -> Self {
        Self {
            amount,
            sending_account_id: Some(account_id),
            receiving_account_id: None,
            entry: TransactionEntry::Atm { atm_id },
        }
    }
}
