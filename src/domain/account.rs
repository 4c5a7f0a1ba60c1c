//! Account model
//!
//! An account is a kind discriminant plus kind-specific payload: checking
//! accounts carry a PIN hash and an overdraft allowance flag, savings and
//! custody accounts point at the checking account that settles their cash.
//! The bank's own custody account (the market counterparty for stock
//! trades) is a custody account with no owning customer and `is_bank` set.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The three account kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    Custody,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::Custody => "custody",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "checking" => Some(AccountKind::Checking),
            "savings" => Some(AccountKind::Savings),
            "custody" => Some(AccountKind::Custody),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountDetails {
    Checking {
        /// SHA-256 hex digest of the ATM PIN. Never the plaintext PIN.
        pin_hash: String,
        overdraft_allowed: bool,
    },
    Savings {
        reference_account_id: Uuid,
    },
    Custody {
        reference_account_id: Uuid,
        /// The distinguished bank custody account acting as market
        /// counterparty for all customer stock trades.
        is_bank: bool,
    },
}

/// A customer (or bank) account.
///
/// `opening_balance` is immutable outside administrative edits; the current
/// balance is always derived from the ledger, never stored here.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub account_id: Uuid,
    pub opening_balance: Decimal,
    pub owner_id: Option<Uuid>,
    pub details: AccountDetails,
}

impl Account {
    pub fn kind(&self) -> AccountKind {
        match self.details {
            AccountDetails::Checking { .. } => AccountKind::Checking,
            AccountDetails::Savings { .. } => AccountKind::Savings,
            AccountDetails::Custody { .. } => AccountKind::Custody,
        }
    }

    pub fn is_checking(&self) -> bool {
        self.kind() == AccountKind::Checking
    }

    /// The checking account that settles cash for this account.
    /// `None` for checking accounts, which settle their own cash.
    pub fn reference_account_id(&self) -> Option<Uuid> {
        match self.details {
            AccountDetails::Checking { .. } => None,
            AccountDetails::Savings {
                reference_account_id,
            } => Some(reference_account_id),
            AccountDetails::Custody {
                reference_account_id,
                ..
            } => Some(reference_account_id),
        }
    }

    pub fn is_bank_custody(&self) -> bool {
        matches!(self.details, AccountDetails::Custody { is_bank: true, .. })
    }

    /// Exact PIN match against the stored digest. Always false for
    /// non-checking accounts.
    pub fn verify_pin(&self, pin: &str) -> bool {
        match &self.details {
            AccountDetails::Checking { pin_hash, .. } => *pin_hash == hash_pin(pin),
            _ => false,
        }
    }
}

/// Hash a PIN for storage.
pub fn hash_pin(pin: &str) -> String {
    hex::encode(Sha256::digest(pin.as_bytes()))
}
