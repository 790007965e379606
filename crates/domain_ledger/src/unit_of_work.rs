//! All-or-nothing mutation of the books
//!
//! Every mutating accessor first records how to undo itself. `commit` forgets
//! the undo log; `rollback`, or dropping the unit without committing, replays
//! it newest first so the books end up exactly as they were.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use tracing::debug;

use core_kernel::{
    BankAccountId, BillId, CustomerId, InvoiceId, LedgerEntryId, OwnerId, PaymentInId,
    PaymentOutId, SupplierId,
};

use crate::activity::ActivityEntry;
use crate::advance::SupplierAdvance;
use crate::balance::BankAccount;
use crate::bill::Bill;
use crate::changes::ChangeSet;
use crate::error::LedgerError;
use crate::invoice::Invoice;
use crate::ledger::{LedgerEntry, NewEntry};
use crate::numbering::SequenceKey;
use crate::parties::{Customer, Supplier};
use crate::payment_in::PaymentIn;
use crate::payment_out::PaymentOut;
use crate::store::Books;

enum Compensation {
    LedgerTruncate(usize),
    LedgerRestore(LedgerEntry),
    BankAccount(BankAccountId, Option<BankAccount>),
    Customer(CustomerId, Option<Customer>),
    Supplier(SupplierId, Option<Supplier>),
    Invoice(InvoiceId, Option<Invoice>),
    Bill(BillId, Option<Bill>),
    Advance((OwnerId, SupplierId), Option<SupplierAdvance>),
    PaymentIn(PaymentInId, Option<PaymentIn>),
    PaymentOut(PaymentOutId, Option<PaymentOut>),
    ActivityTruncate(usize),
    Sequence(SequenceKey, Option<u32>),
}

/// A pending set of changes to the books
pub struct UnitOfWork<'a> {
    books: &'a mut Books,
    undo: Vec<Compensation>,
}

impl<'a> UnitOfWork<'a> {
    pub fn begin(books: &'a mut Books) -> Self {
        Self { books, undo: Vec::new() }
    }

    /// Read access to the current state, including changes made so far
    pub fn books(&self) -> &Books {
        self.books
    }

    /// Number of recorded undo steps
    pub fn pending(&self) -> usize {
        self.undo.len()
    }

    /// Post-change copies of every record touched so far
    ///
    /// Records that no longer exist are listed only for bank accounts, the one
    /// table a unit of work can delete from.
    pub fn changes(&self) -> ChangeSet {
        let mut ledger_mark = self.books.ledger.len();
        let mut activity_mark = self.books.activity.len();
        let mut restored = BTreeSet::new();
        let mut banks = BTreeSet::new();
        let mut customers = BTreeSet::new();
        let mut suppliers = BTreeSet::new();
        let mut invoices = BTreeSet::new();
        let mut bills = BTreeSet::new();
        let mut advances = BTreeSet::new();
        let mut payments_in = BTreeSet::new();
        let mut payments_out = BTreeSet::new();
        let mut counters = BTreeSet::new();

        for step in &self.undo {
            match step {
                Compensation::LedgerTruncate(len) => ledger_mark = ledger_mark.min(*len),
                Compensation::LedgerRestore(entry) => {
                    restored.insert(entry.id);
                }
                Compensation::BankAccount(id, _) => {
                    banks.insert(*id);
                }
                Compensation::Customer(id, _) => {
                    customers.insert(*id);
                }
                Compensation::Supplier(id, _) => {
                    suppliers.insert(*id);
                }
                Compensation::Invoice(id, _) => {
                    invoices.insert(*id);
                }
                Compensation::Bill(id, _) => {
                    bills.insert(*id);
                }
                Compensation::Advance(key, _) => {
                    advances.insert(*key);
                }
                Compensation::PaymentIn(id, _) => {
                    payments_in.insert(*id);
                }
                Compensation::PaymentOut(id, _) => {
                    payments_out.insert(*id);
                }
                Compensation::ActivityTruncate(len) => activity_mark = activity_mark.min(*len),
                Compensation::Sequence(key, _) => {
                    counters.insert(key.clone());
                }
            }
        }

        let books = &*self.books;
        let new_entries = &books.ledger.entries()[ledger_mark.min(books.ledger.len())..];
        let mut entries: Vec<LedgerEntry> = books
            .ledger
            .entries()
            .iter()
            .filter(|e| restored.contains(&e.id) && !new_entries.iter().any(|n| n.id == e.id))
            .cloned()
            .collect();
        entries.extend(new_entries.iter().cloned());

        let mut changes = ChangeSet {
            entries,
            activity: books.activity[activity_mark.min(books.activity.len())..].to_vec(),
            ..ChangeSet::default()
        };
        for id in banks {
            match books.bank_accounts.find(id) {
                Some(account) => changes.bank_accounts.push(account.clone()),
                None => changes.closed_bank_accounts.push(id),
            }
        }
        changes.customers = customers.iter().filter_map(|id| books.customers.get(id).cloned()).collect();
        changes.suppliers = suppliers.iter().filter_map(|id| books.suppliers.get(id).cloned()).collect();
        changes.invoices = invoices.iter().filter_map(|id| books.invoices.get(id).cloned()).collect();
        changes.bills = bills.iter().filter_map(|id| books.bills.get(id).cloned()).collect();
        changes.advances = advances
            .iter()
            .filter_map(|(owner, supplier)| books.advances.get(*owner, *supplier).cloned())
            .collect();
        changes.payments_in = payments_in.iter().filter_map(|id| books.payments_in.get(id).cloned()).collect();
        changes.payments_out = payments_out.iter().filter_map(|id| books.payments_out.get(id).cloned()).collect();
        changes.counters = counters
            .into_iter()
            .filter_map(|key| books.sequences.current(&key).map(|value| (key, value)))
            .collect();
        changes
    }

    /// Keeps every change
    pub fn commit(mut self) {
        self.undo.clear();
    }

    /// Undoes every change, returning how many steps were replayed
    pub fn rollback(mut self) -> usize {
        let steps = self.undo.len();
        self.undo_all();
        steps
    }

    /// Appends an entry and applies it to the cached bank balances
    ///
    /// Bank sides must be active. Voids skip this check.
    pub fn post_entry(&mut self, new: NewEntry, now: DateTime<Utc>) -> Result<LedgerEntry, LedgerError> {
        for id in [new.from.bank_id(), new.to.bank_id()].into_iter().flatten() {
            self.books.bank_accounts.get_active(new.owner, id)?;
        }
        let mark = self.books.ledger.len();
        let entry = self.books.ledger.append(new, now)?;
        self.undo.push(Compensation::LedgerTruncate(mark));
        self.snapshot_banks(&entry);
        self.books.bank_accounts.apply_entry(&entry)?;
        Ok(entry)
    }

    /// Voids an entry and removes its effect from the cached bank balances
    pub fn void_entry(
        &mut self,
        owner: OwnerId,
        id: LedgerEntryId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        let original = self
            .books
            .ledger
            .get(owner, id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("Ledger entry", id))?;
        let mark = self.books.ledger.len();
        let compensating = self.books.ledger.void(owner, id, reason, now)?;
        self.undo.push(Compensation::LedgerRestore(original.clone()));
        self.undo.push(Compensation::LedgerTruncate(mark));
        self.snapshot_banks(&original);
        self.books.bank_accounts.revert_entry(&original)?;
        Ok(compensating)
    }

    /// Sets the bank-statement flag on an entry
    pub fn set_reconciled(
        &mut self,
        owner: OwnerId,
        id: LedgerEntryId,
        reconciled: bool,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        let original = self
            .books
            .ledger
            .get(owner, id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("Ledger entry", id))?;
        let updated = self.books.ledger.set_reconciled(owner, id, reconciled, now)?;
        self.undo.push(Compensation::LedgerRestore(original));
        Ok(updated)
    }

    pub fn open_bank_account(&mut self, account: BankAccount) -> Result<(), LedgerError> {
        let id = account.id;
        self.books.bank_accounts.open(account)?;
        self.undo.push(Compensation::BankAccount(id, None));
        Ok(())
    }

    pub fn remove_bank_account(&mut self, id: BankAccountId) -> Option<BankAccount> {
        let removed = self.books.bank_accounts.remove(id);
        if let Some(account) = &removed {
            self.undo.push(Compensation::BankAccount(id, Some(account.clone())));
        }
        removed
    }

    pub fn bank_account_mut(
        &mut self,
        owner: OwnerId,
        id: BankAccountId,
    ) -> Result<&mut BankAccount, LedgerError> {
        let prior = self.books.bank_accounts.get(owner, id)?.clone();
        self.undo.push(Compensation::BankAccount(id, Some(prior)));
        self.books
            .bank_accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::not_found("Bank account", id))
    }

    pub fn insert_customer(&mut self, customer: Customer) {
        let prior = self.books.customers.insert(customer.id, customer.clone());
        self.undo.push(Compensation::Customer(customer.id, prior));
    }

    pub fn customer_mut(&mut self, owner: OwnerId, id: CustomerId) -> Result<&mut Customer, LedgerError> {
        let prior = self.books.customer(owner, id)?.clone();
        self.undo.push(Compensation::Customer(id, Some(prior)));
        self.books
            .customers
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("Customer", id))
    }

    pub fn insert_supplier(&mut self, supplier: Supplier) {
        let prior = self.books.suppliers.insert(supplier.id, supplier.clone());
        self.undo.push(Compensation::Supplier(supplier.id, prior));
    }

    pub fn supplier_mut(&mut self, owner: OwnerId, id: SupplierId) -> Result<&mut Supplier, LedgerError> {
        let prior = self.books.supplier(owner, id)?.clone();
        self.undo.push(Compensation::Supplier(id, Some(prior)));
        self.books
            .suppliers
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("Supplier", id))
    }

    pub fn insert_invoice(&mut self, invoice: Invoice) {
        let prior = self.books.invoices.insert(invoice.id, invoice.clone());
        self.undo.push(Compensation::Invoice(invoice.id, prior));
    }

    pub fn invoice_mut(&mut self, owner: OwnerId, id: InvoiceId) -> Result<&mut Invoice, LedgerError> {
        let prior = self.books.invoice(owner, id)?.clone();
        self.undo.push(Compensation::Invoice(id, Some(prior)));
        self.books
            .invoices
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("Invoice", id))
    }

    pub fn insert_bill(&mut self, bill: Bill) {
        let prior = self.books.bills.insert(bill.id, bill.clone());
        self.undo.push(Compensation::Bill(bill.id, prior));
    }

    pub fn bill_mut(&mut self, owner: OwnerId, id: BillId) -> Result<&mut Bill, LedgerError> {
        let prior = self.books.bill(owner, id)?.clone();
        self.undo.push(Compensation::Bill(id, Some(prior)));
        self.books
            .bills
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("Bill", id))
    }

    /// The supplier's advance record, created zeroed on first use
    pub fn advance_mut(&mut self, owner: OwnerId, supplier: SupplierId) -> &mut SupplierAdvance {
        let prior = self.books.advances.get(owner, supplier).cloned();
        self.undo.push(Compensation::Advance((owner, supplier), prior));
        self.books.advances.get_or_create(owner, supplier)
    }

    pub fn insert_payment_in(&mut self, payment: PaymentIn) {
        let prior = self.books.payments_in.insert(payment.id, payment.clone());
        self.undo.push(Compensation::PaymentIn(payment.id, prior));
    }

    pub fn insert_payment_out(&mut self, payment: PaymentOut) {
        let prior = self.books.payments_out.insert(payment.id, payment.clone());
        self.undo.push(Compensation::PaymentOut(payment.id, prior));
    }

    pub fn payment_out_mut(
        &mut self,
        owner: OwnerId,
        id: PaymentOutId,
    ) -> Result<&mut PaymentOut, LedgerError> {
        let prior = self.books.payment_out(owner, id)?.clone();
        self.undo.push(Compensation::PaymentOut(id, Some(prior)));
        self.books
            .payments_out
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("Payment out", id))
    }

    pub fn push_activity(&mut self, entry: ActivityEntry) {
        self.undo.push(Compensation::ActivityTruncate(self.books.activity.len()));
        self.books.activity.push(entry);
    }

    /// Draws the next document number for the day
    pub fn next_number(&mut self, owner: OwnerId, prefix: &str, date: NaiveDate) -> String {
        let key = (owner, prefix.to_string(), date);
        let prior = self.books.sequences.current(&key);
        self.undo.push(Compensation::Sequence(key, prior));
        self.books.sequences.next(owner, prefix, date)
    }

    fn snapshot_banks(&mut self, entry: &LedgerEntry) {
        for id in [entry.from.bank_id(), entry.to.bank_id()].into_iter().flatten() {
            let prior = self.books.bank_accounts.find(id).cloned();
            self.undo.push(Compensation::BankAccount(id, prior));
        }
    }

    fn undo_all(&mut self) {
        if !self.undo.is_empty() {
            debug!(steps = self.undo.len(), "rolling back unit of work");
        }
        while let Some(step) = self.undo.pop() {
            match step {
                Compensation::LedgerTruncate(len) => self.books.ledger.truncate(len),
                Compensation::LedgerRestore(entry) => self.books.ledger.restore(entry),
                Compensation::BankAccount(id, prior) => self.books.bank_accounts.restore(id, prior),
                Compensation::Customer(id, prior) => restore(&mut self.books.customers, id, prior),
                Compensation::Supplier(id, prior) => restore(&mut self.books.suppliers, id, prior),
                Compensation::Invoice(id, prior) => restore(&mut self.books.invoices, id, prior),
                Compensation::Bill(id, prior) => restore(&mut self.books.bills, id, prior),
                Compensation::Advance(key, prior) => self.books.advances.restore(key, prior),
                Compensation::PaymentIn(id, prior) => restore(&mut self.books.payments_in, id, prior),
                Compensation::PaymentOut(id, prior) => restore(&mut self.books.payments_out, id, prior),
                Compensation::ActivityTruncate(len) => self.books.activity.truncate(len),
                Compensation::Sequence(key, prior) => self.books.sequences.restore(key, prior),
            }
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        self.undo_all();
    }
}

fn restore<K: Eq + Hash, V>(map: &mut HashMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}
