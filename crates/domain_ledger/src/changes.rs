//! Write-ahead hand-off to durable storage
//!
//! A [`ChangeSet`] lists every record a unit of work created or modified, in
//! its post-change form. The engine hands it to a [`ChangeSink`] before the
//! in-memory commit; if the sink fails the unit of work is rolled back, so
//! the books never hold state the store does not.

use core_kernel::BankAccountId;

use crate::activity::ActivityEntry;
use crate::advance::SupplierAdvance;
use crate::balance::BankAccount;
use crate::bill::Bill;
use crate::error::LedgerError;
use crate::invoice::Invoice;
use crate::ledger::LedgerEntry;
use crate::numbering::SequenceKey;
use crate::parties::{Customer, Supplier};
use crate::payment_in::PaymentIn;
use crate::payment_out::PaymentOut;

/// Records touched by one unit of work
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// New entries and entries whose void or reconciliation flags changed,
    /// in sequence order
    pub entries: Vec<LedgerEntry>,
    pub bank_accounts: Vec<BankAccount>,
    pub closed_bank_accounts: Vec<BankAccountId>,
    pub customers: Vec<Customer>,
    pub suppliers: Vec<Supplier>,
    pub invoices: Vec<Invoice>,
    pub bills: Vec<Bill>,
    pub advances: Vec<SupplierAdvance>,
    pub payments_in: Vec<PaymentIn>,
    pub payments_out: Vec<PaymentOut>,
    /// Activity lines appended by this unit
    pub activity: Vec<ActivityEntry>,
    /// Latest value of every document counter drawn
    pub counters: Vec<(SequenceKey, u32)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.bank_accounts.is_empty()
            && self.closed_bank_accounts.is_empty()
            && self.customers.is_empty()
            && self.suppliers.is_empty()
            && self.invoices.is_empty()
            && self.bills.is_empty()
            && self.advances.is_empty()
            && self.payments_in.is_empty()
            && self.payments_out.is_empty()
            && self.activity.is_empty()
            && self.counters.is_empty()
    }

    /// Number of records to write
    pub fn len(&self) -> usize {
        self.entries.len()
            + self.bank_accounts.len()
            + self.closed_bank_accounts.len()
            + self.customers.len()
            + self.suppliers.len()
            + self.invoices.len()
            + self.bills.len()
            + self.advances.len()
            + self.payments_in.len()
            + self.payments_out.len()
            + self.activity.len()
            + self.counters.len()
    }
}

/// Durable store for committed changes
///
/// `persist` must write the whole set atomically or not at all. It is called
/// while the engine holds its write lock.
pub trait ChangeSink: Send + Sync {
    fn persist(&self, operation: &'static str, changes: &ChangeSet) -> Result<(), LedgerError>;
}
