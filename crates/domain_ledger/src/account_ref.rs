//! Account references
//!
//! Every ledger entry moves money from one account reference to another. A
//! reference is one of three things: an owned bank account, the virtual cash
//! account, or an external category such as `"sale"` or `"supplier-payment"`
//! that marks money entering or leaving the books.
//!
//! The text form is what gets stored: `"cash"`, a bank account id, or the
//! category name.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use core_kernel::BankAccountId;

use crate::error::LedgerError;

/// Text form of the cash account
pub const CASH: &str = "cash";

/// A free-text category outside the owner's liquid accounts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalCategory(String);

impl ExternalCategory {
    /// Category used for customer receipts
    pub const EXTERNAL: &'static str = "external";
    /// Category used for supplier disbursements
    pub const SUPPLIER_PAYMENT: &'static str = "supplier-payment";

    /// Creates a category, rejecting empty names and the cash sentinel
    pub fn new(name: impl Into<String>) -> Result<Self, LedgerError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::validation("account category must not be empty"));
        }
        if name.eq_ignore_ascii_case(CASH) {
            return Err(LedgerError::validation("'cash' is not an external category"));
        }
        Ok(Self(name))
    }

    /// The generic external source of customer receipts
    pub fn external() -> Self {
        Self(Self::EXTERNAL.to_string())
    }

    /// The sink of supplier disbursements
    pub fn supplier_payment() -> Self {
        Self(Self::SUPPLIER_PAYMENT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccountRef {
    /// An owned bank account, balance cached on the account
    Bank(BankAccountId),
    /// The virtual cash account, balance always recomputed
    Cash,
    /// Money entering or leaving the books
    External(ExternalCategory),
}

impl AccountRef {
    /// Shorthand for an external category reference
    pub fn external(name: impl Into<String>) -> Result<Self, LedgerError> {
        ExternalCategory::new(name).map(AccountRef::External)
    }

    /// Returns the bank account id if this is a bank reference
    pub fn bank_id(&self) -> Option<BankAccountId> {
        match self {
            AccountRef::Bank(id) => Some(*id),
            AccountRef::Cash | AccountRef::External(_) => None,
        }
    }

    pub fn is_cash(&self) -> bool {
        matches!(self, AccountRef::Cash)
    }

    /// Returns true for cash and bank accounts, the ones that hold a balance
    pub fn is_liquid(&self) -> bool {
        match self {
            AccountRef::Bank(_) | AccountRef::Cash => true,
            AccountRef::External(_) => false,
        }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Bank(id) => write!(f, "{}", id),
            AccountRef::Cash => f.write_str(CASH),
            AccountRef::External(category) => write!(f, "{}", category),
        }
    }
}

impl FromStr for AccountRef {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(CASH) {
            return Ok(AccountRef::Cash);
        }
        if let Ok(id) = trimmed.parse::<BankAccountId>() {
            return Ok(AccountRef::Bank(id));
        }
        ExternalCategory::new(trimmed).map(AccountRef::External)
    }
}

impl From<BankAccountId> for AccountRef {
    fn from(id: BankAccountId) -> Self {
        AccountRef::Bank(id)
    }
}

impl Serialize for AccountRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
