//! Customer invoices and the settlement status shared with bills

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{CustomerId, InvoiceId, Money, OwnerId};

use crate::error::LedgerError;

/// How much of a document has been settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Derives the status from what is left and what has been settled so far
    ///
    /// A remainder within the one-paisa tolerance counts as paid.
    pub fn derive(remaining: Money, settled: Money) -> Self {
        if Money::settles(remaining) {
            PaymentStatus::Paid
        } else if settled.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(LedgerError::validation(format!("unknown settlement status '{}'", other))),
        }
    }
}

/// A sales invoice raised against a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub owner: OwnerId,
    pub customer: CustomerId,
    pub invoice_no: String,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub returned_amount: Money,
    pub payment_status: PaymentStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates an unpaid invoice
    pub fn new(
        owner: OwnerId,
        customer: CustomerId,
        invoice_no: impl Into<String>,
        total_amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvoiceId::new_v7(),
            owner,
            customer,
            invoice_no: invoice_no.into(),
            total_amount,
            paid_amount: Money::ZERO,
            returned_amount: Money::ZERO,
            payment_status: PaymentStatus::derive(total_amount, Money::ZERO),
            version: 0,
            created_at,
        }
    }

    /// Sets amounts already paid or returned before the invoice reaches the ledger
    pub fn with_settled(mut self, paid: Money, returned: Money) -> Self {
        self.paid_amount = paid;
        self.returned_amount = returned;
        self.payment_status = self.derived_status();
        self
    }

    /// What the customer still owes on this invoice
    pub fn balance(&self) -> Money {
        self.total_amount - self.paid_amount - self.returned_amount
    }

    pub fn derived_status(&self) -> PaymentStatus {
        PaymentStatus::derive(self.balance(), self.paid_amount)
    }

    /// Records a receipt against the invoice and refreshes its status
    pub(crate) fn apply_payment(&mut self, amount: Money) -> Result<(), LedgerError> {
        self.paid_amount = self.paid_amount.checked_add(&amount)?;
        self.payment_status = self.derived_status();
        self.version += 1;
        Ok(())
    }
}
