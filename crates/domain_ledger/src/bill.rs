//! Supplier bills
//!
//! A bill keeps its own audit trail of every allocation applied to it or
//! reversed from it, so its paid amount can always be explained.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, Money, OwnerId, PaymentOutId, SupplierId};

use crate::error::LedgerError;
use crate::invoice::PaymentStatus;

/// What happened to a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillAction {
    PaymentApplied,
    PaymentReversed,
    AdvanceApplied,
}

/// One line of a bill's audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillAuditEntry {
    pub action: BillAction,
    pub amount: Money,
    pub payment_out: Option<PaymentOutId>,
    pub note: String,
    pub at: DateTime<Utc>,
}

/// A purchase bill owed to a supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub owner: OwnerId,
    pub supplier: SupplierId,
    pub bill_no: String,
    pub bill_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub total_amount: Money,
    pub paid_amount: Money,
    /// Settled through debit notes rather than payments
    pub credit_applied: Money,
    pub outstanding_amount: Money,
    pub payment_status: PaymentStatus,
    pub is_deleted: bool,
    pub audit: Vec<BillAuditEntry>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Creates an unpaid bill
    ///
    /// # Arguments
    ///
    /// * `owner` - Owner of the books
    /// * `supplier` - Supplier the bill is owed to
    /// * `bill_no` - Supplier's bill number
    /// * `bill_date` - Date printed on the bill
    /// * `total_amount` - Bill total
    pub fn new(
        owner: OwnerId,
        supplier: SupplierId,
        bill_no: impl Into<String>,
        bill_date: NaiveDate,
        total_amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BillId::new_v7(),
            owner,
            supplier,
            bill_no: bill_no.into(),
            bill_date,
            due_date: None,
            total_amount,
            paid_amount: Money::ZERO,
            credit_applied: Money::ZERO,
            outstanding_amount: total_amount,
            payment_status: PaymentStatus::derive(total_amount, Money::ZERO),
            is_deleted: false,
            audit: Vec::new(),
            version: 0,
            created_at,
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets amounts settled before the bill reaches the ledger
    pub fn with_settled(mut self, paid: Money, credit_applied: Money) -> Self {
        self.paid_amount = paid;
        self.credit_applied = credit_applied;
        self.outstanding_amount = self.computed_outstanding();
        self.payment_status = self.derived_status();
        self
    }

    /// total - paid - credit applied
    pub fn computed_outstanding(&self) -> Money {
        self.total_amount - self.paid_amount - self.credit_applied
    }

    pub fn derived_status(&self) -> PaymentStatus {
        PaymentStatus::derive(
            self.computed_outstanding(),
            self.paid_amount + self.credit_applied,
        )
    }

    /// Records money applied to the bill, from a payment or an advance
    pub(crate) fn apply_payment(
        &mut self,
        amount: Money,
        action: BillAction,
        payment_out: Option<PaymentOutId>,
        note: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.paid_amount = self.paid_amount.checked_add(&amount)?;
        self.refresh(action, amount, payment_out, note.into(), at)
    }

    /// Takes back an amount applied by a payment that was bounced or cancelled
    pub(crate) fn reverse_payment(
        &mut self,
        amount: Money,
        payment_out: Option<PaymentOutId>,
        note: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.paid_amount = self.paid_amount.checked_sub(&amount)?;
        self.refresh(BillAction::PaymentReversed, amount, payment_out, note.into(), at)
    }

    fn refresh(
        &mut self,
        action: BillAction,
        amount: Money,
        payment_out: Option<PaymentOutId>,
        note: String,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.outstanding_amount = self
            .total_amount
            .checked_sub(&self.paid_amount)?
            .checked_sub(&self.credit_applied)?;
        self.payment_status = self.derived_status();
        self.audit.push(BillAuditEntry { action, amount, payment_out, note, at });
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bill(total: Money) -> Bill {
        Bill::new(
            OwnerId::new(),
            SupplierId::new(),
            "B-17",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            total,
            Utc::now(),
        )
    }

    #[test]
    fn test_new_bill_is_unpaid() {
        let b = bill(Money::new(dec!(5000)));
        assert_eq!(b.outstanding_amount, Money::new(dec!(5000)));
        assert_eq!(b.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_credit_applied_counts_as_partial() {
        let b = bill(Money::new(dec!(5000))).with_settled(Money::ZERO, Money::new(dec!(500)));
        assert_eq!(b.outstanding_amount, Money::new(dec!(4500)));
        assert_eq!(b.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_apply_then_reverse_restores_amounts() {
        let mut b = bill(Money::new(dec!(5000)));
        let before = (b.paid_amount, b.outstanding_amount, b.payment_status);

        b.apply_payment(Money::new(dec!(5000)), BillAction::PaymentApplied, None, "paid", Utc::now()).unwrap();
        assert_eq!(b.payment_status, PaymentStatus::Paid);

        b.reverse_payment(Money::new(dec!(5000)), None, "bounced", Utc::now()).unwrap();
        assert_eq!((b.paid_amount, b.outstanding_amount, b.payment_status), before);
        assert_eq!(b.audit.len(), 2);
    }
}
