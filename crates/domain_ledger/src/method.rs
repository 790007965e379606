//! Payment methods shared by receipts and disbursements

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

/// How money changed hands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Upi,
    Card,
    #[serde(alias = "bank")]
    BankTransfer,
    Cheque,
}

impl PaymentMethod {
    /// Every method except cash moves money through a bank account
    pub fn requires_bank_account(&self) -> bool {
        match self {
            PaymentMethod::Cash => false,
            PaymentMethod::Upi | PaymentMethod::Card | PaymentMethod::BankTransfer | PaymentMethod::Cheque => true,
        }
    }

    pub fn is_cheque(&self) -> bool {
        matches!(self, PaymentMethod::Cheque)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
        }
    }

    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "upi" => Ok(PaymentMethod::Upi),
            "card" => Ok(PaymentMethod::Card),
            "bank" | "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "cheque" => Ok(PaymentMethod::Cheque),
            other => Err(LedgerError::validation(format!("unknown payment method '{}'", other))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
