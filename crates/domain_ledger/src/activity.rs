//! Customer activity log used by reporting
//!
//! Each receipt writes lines here describing how it was split: the amount
//! allocated to invoices, the credit consumed, and any excess turned into
//! credit. The log is append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{ActivityEntryId, CustomerId, Money, OwnerId, PaymentInId};

use crate::error::LedgerError;
use crate::method::PaymentMethod;

/// Method label on an activity line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityMethod {
    Cash,
    Upi,
    Card,
    Bank,
    Cheque,
    /// More than one method in the same receipt
    Split,
    /// Customer credit consumed or created
    Credit,
}

impl ActivityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityMethod::Cash => "cash",
            ActivityMethod::Upi => "upi",
            ActivityMethod::Card => "card",
            ActivityMethod::Bank => "bank",
            ActivityMethod::Cheque => "cheque",
            ActivityMethod::Split => "split",
            ActivityMethod::Credit => "credit",
        }
    }
}

impl FromStr for ActivityMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(ActivityMethod::Cash),
            "upi" => Ok(ActivityMethod::Upi),
            "card" => Ok(ActivityMethod::Card),
            "bank" => Ok(ActivityMethod::Bank),
            "cheque" => Ok(ActivityMethod::Cheque),
            "split" => Ok(ActivityMethod::Split),
            "credit" => Ok(ActivityMethod::Credit),
            other => Err(LedgerError::validation(format!("unknown activity method '{}'", other))),
        }
    }
}

impl From<PaymentMethod> for ActivityMethod {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => ActivityMethod::Cash,
            PaymentMethod::Upi => ActivityMethod::Upi,
            PaymentMethod::Card => ActivityMethod::Card,
            PaymentMethod::BankTransfer => ActivityMethod::Bank,
            PaymentMethod::Cheque => ActivityMethod::Cheque,
        }
    }
}

/// One line of the activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: ActivityEntryId,
    pub owner: OwnerId,
    pub customer: CustomerId,
    pub payment_in: PaymentInId,
    /// Signed: negative lines move money into customer credit
    pub amount: Money,
    pub method: ActivityMethod,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
