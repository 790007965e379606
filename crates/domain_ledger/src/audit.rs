//! Consistency audit
//!
//! Recomputes every derived figure from its source of truth and reports
//! where the stored value disagrees. Nothing is repaired here.
//!
//! Customer dues move by the invoice balance when an invoice is recorded and
//! by `credit_applied - allocated - excess` on every receipt. Allocations also
//! lower invoice balances, so dues always equal opening dues plus open
//! invoice balances plus `credit_applied - excess` over all receipts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use core_kernel::{CustomerId, Money, OwnerId, SupplierId};

use crate::error::LedgerError;
use crate::store::Books;

/// What disagreed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// Cached bank balance against opening plus ledger movement
    BankBalance,
    /// Customer dues against opening dues, open invoices and receipts
    CustomerDues,
    /// Supplier outstanding against its opening payable plus open bills
    SupplierOutstanding,
    /// Supplier advance balance against the advance record
    SupplierAdvanceBalance,
    /// Supplier total advance given against the advance record
    SupplierAdvanceGiven,
    /// Advance remaining against given minus used
    AdvanceRemaining,
    InvoiceStatus,
    BillStatus,
    BillOutstanding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    pub kind: DriftKind,
    pub entity_id: String,
    pub stored: String,
    pub expected: String,
}

/// Outcome of one audit pass over an owner's books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub owner: OwnerId,
    pub checked_at: DateTime<Utc>,
    pub drifts: Vec<Drift>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.drifts.is_empty()
    }
}

/// Runs every consistency check for `owner`
pub fn audit(books: &Books, owner: OwnerId, now: DateTime<Utc>) -> Result<DriftReport, LedgerError> {
    let mut drifts = Vec::new();

    for account in books.bank_accounts.accounts_for(owner) {
        let expected = books.bank_accounts.expected_balance(account.id, &books.ledger)?;
        record(&mut drifts, DriftKind::BankBalance, account.id, account.current_balance(), expected);
    }

    let mut open_by_supplier: HashMap<SupplierId, Money> = HashMap::new();
    let mut bills: Vec<_> = books.bills.values().filter(|b| b.owner == owner).collect();
    bills.sort_by_key(|b| b.id);
    for bill in bills {
        record(
            &mut drifts,
            DriftKind::BillOutstanding,
            bill.id,
            bill.outstanding_amount,
            bill.computed_outstanding(),
        );
        record(
            &mut drifts,
            DriftKind::BillStatus,
            bill.id,
            bill.payment_status.as_str(),
            bill.derived_status().as_str(),
        );
        if !bill.is_deleted {
            let total = open_by_supplier.entry(bill.supplier).or_insert(Money::ZERO);
            *total = total.checked_add(&bill.outstanding_amount)?;
        }
    }

    let mut dues_by_customer: HashMap<CustomerId, Money> = HashMap::new();
    let mut invoices: Vec<_> = books.invoices.values().filter(|i| i.owner == owner).collect();
    invoices.sort_by_key(|i| i.id);
    for invoice in invoices {
        record(
            &mut drifts,
            DriftKind::InvoiceStatus,
            invoice.id,
            invoice.payment_status.as_str(),
            invoice.derived_status().as_str(),
        );
        let dues = dues_by_customer.entry(invoice.customer).or_insert(Money::ZERO);
        *dues = dues.checked_add(&invoice.balance())?;
    }
    for payment in books.payments_in.values().filter(|p| p.owner == owner) {
        let dues = dues_by_customer.entry(payment.customer).or_insert(Money::ZERO);
        *dues = dues
            .checked_add(&payment.credit_applied)?
            .checked_sub(&payment.excess_amount)?;
    }

    let mut customers: Vec<_> = books.customers.values().filter(|c| c.owner == owner).collect();
    customers.sort_by_key(|c| c.id);
    for customer in customers {
        let movement = dues_by_customer.get(&customer.id).copied().unwrap_or(Money::ZERO);
        let expected = customer.opening_dues().checked_add(&movement)?;
        record(&mut drifts, DriftKind::CustomerDues, customer.id, customer.dues(), expected);
    }

    let mut suppliers: Vec<_> = books.suppliers.values().filter(|s| s.owner == owner).collect();
    suppliers.sort_by_key(|s| s.id);
    for supplier in suppliers {
        let open = open_by_supplier.get(&supplier.id).copied().unwrap_or(Money::ZERO);
        record(
            &mut drifts,
            DriftKind::SupplierOutstanding,
            supplier.id,
            supplier.outstanding_balance(),
            supplier.opening_outstanding().checked_add(&open)?,
        );

        let (remaining, given) = books
            .advances
            .get(owner, supplier.id)
            .map_or((Money::ZERO, Money::ZERO), |r| (r.remaining(), r.total_given()));
        record(
            &mut drifts,
            DriftKind::SupplierAdvanceBalance,
            supplier.id,
            supplier.advance_balance(),
            remaining,
        );
        record(
            &mut drifts,
            DriftKind::SupplierAdvanceGiven,
            supplier.id,
            supplier.total_advance_given(),
            given,
        );
    }

    for advance in books.advances.records_for(owner) {
        let expected = advance.total_given().checked_sub(&advance.total_used())?;
        record(&mut drifts, DriftKind::AdvanceRemaining, advance.supplier, advance.remaining(), expected);
    }

    Ok(DriftReport { owner, checked_at: now, drifts })
}

fn record<I, V>(drifts: &mut Vec<Drift>, kind: DriftKind, id: I, stored: V, expected: V)
where
    I: std::fmt::Display,
    V: PartialEq + std::fmt::Display,
{
    if stored == expected {
        return;
    }
    let drift = Drift {
        kind,
        entity_id: id.to_string(),
        stored: stored.to_string(),
        expected: expected.to_string(),
    };
    warn!(
        kind = ?drift.kind,
        entity = %drift.entity_id,
        stored = %drift.stored,
        expected = %drift.expected,
        "ledger drift detected"
    );
    drifts.push(drift);
}
