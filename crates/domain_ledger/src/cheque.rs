//! Payment-out lifecycle
//!
//! ```text
//!   cash/bank/upi/card ──► Completed ──cancel──► Cancelled
//!   cheque ──► Pending ──clear──► Cleared ──cancel──► Cancelled
//!                 │  └──cancel──► Cancelled
//!                 └──bounce──► Bounced
//! ```
//!
//! Every status change goes through [`PaymentOutStatus::transition`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Status of a supplier payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutStatus {
    /// Cheque issued, funds not yet moved
    Pending,
    /// Non-cheque payment, funds moved at creation
    Completed,
    /// Cheque honoured by the bank
    Cleared,
    /// Cheque returned unpaid
    Bounced,
    Cancelled,
}

/// Something that happens to a payment after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEvent {
    Clear,
    Bounce,
    Cancel,
}

impl StatusEvent {
    /// Status the event leads to when it is allowed
    pub fn target(&self) -> PaymentOutStatus {
        match self {
            StatusEvent::Clear => PaymentOutStatus::Cleared,
            StatusEvent::Bounce => PaymentOutStatus::Bounced,
            StatusEvent::Cancel => PaymentOutStatus::Cancelled,
        }
    }
}

impl PaymentOutStatus {
    /// Applies an event, rejecting anything the lifecycle does not allow
    ///
    /// # Errors
    ///
    /// - `LedgerError::AlreadyCancelled` when cancelling a cancelled payment
    /// - `LedgerError::InvalidStatusTransition` for every other illegal pair
    pub fn transition(self, event: StatusEvent) -> Result<PaymentOutStatus, LedgerError> {
        use PaymentOutStatus::*;
        match (self, event) {
            (Pending, StatusEvent::Clear) => Ok(Cleared),
            (Pending, StatusEvent::Bounce) => Ok(Bounced),
            (Pending | Completed | Cleared, StatusEvent::Cancel) => Ok(Cancelled),
            (Cancelled, StatusEvent::Cancel) => Err(LedgerError::AlreadyCancelled),
            (from, event) => Err(LedgerError::InvalidStatusTransition {
                from: from.to_string(),
                to: event.target().to_string(),
            }),
        }
    }

    /// Bills, supplier and advance effects are in place in this status
    pub fn holds_allocations(&self) -> bool {
        match self {
            PaymentOutStatus::Pending | PaymentOutStatus::Completed | PaymentOutStatus::Cleared => true,
            PaymentOutStatus::Bounced | PaymentOutStatus::Cancelled => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutStatus::Pending => "pending",
            PaymentOutStatus::Completed => "completed",
            PaymentOutStatus::Cleared => "cleared",
            PaymentOutStatus::Bounced => "bounced",
            PaymentOutStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentOutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentOutStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentOutStatus::Pending),
            "completed" => Ok(PaymentOutStatus::Completed),
            "cleared" => Ok(PaymentOutStatus::Cleared),
            "bounced" => Ok(PaymentOutStatus::Bounced),
            "cancelled" => Ok(PaymentOutStatus::Cancelled),
            other => Err(LedgerError::validation(format!("unknown payment status '{}'", other))),
        }
    }
}

/// Cheque particulars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChequeDetails {
    pub cheque_number: String,
    pub cheque_date: NaiveDate,
    pub bank_name: Option<String>,
    pub cleared_at: Option<DateTime<Utc>>,
    pub bounced_at: Option<DateTime<Utc>>,
    pub bounce_reason: Option<String>,
}

impl ChequeDetails {
    pub fn new(cheque_number: impl Into<String>, cheque_date: NaiveDate) -> Self {
        Self {
            cheque_number: cheque_number.into(),
            cheque_date,
            bank_name: None,
            cleared_at: None,
            bounced_at: None,
            bounce_reason: None,
        }
    }

    pub fn with_bank_name(mut self, bank_name: impl Into<String>) -> Self {
        self.bank_name = Some(bank_name.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), LedgerError> {
        if self.cheque_number.trim().is_empty() {
            return Err(LedgerError::validation("cheque number is required for cheque payments"));
        }
        Ok(())
    }
}
