//! The ledger engine
//!
//! `LedgerEngine` owns the books behind an `RwLock`. Every mutating call
//! takes the write lock, runs inside a [`UnitOfWork`], and either commits as
//! a whole or leaves the books untouched. Readers share the read lock.
//!
//! With a [`ChangeSink`] attached, the changes of each call are persisted
//! before the in-memory commit. A storage failure rolls the call back.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use core_kernel::{
    BankAccountId, BillId, CustomerId, DateRange, InvoiceId, LedgerEntryId, Money, OwnerId,
    PaymentInId, PaymentOutId, SupplierId,
};

use crate::account_ref::AccountRef;
use crate::activity::ActivityEntry;
use crate::advance::SupplierAdvance;
use crate::audit::{self, DriftReport};
use crate::balance::{BankAccount, BankAccountStatus};
use crate::bill::Bill;
use crate::cashbank::{self, BankSummary, CashBankPosition, CashTransactionRequest, TransferRequest};
use crate::changes::ChangeSink;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::LedgerError;
use crate::invoice::Invoice;
use crate::ledger::LedgerEntry;
use crate::parties::{Customer, Supplier};
use crate::payment_in::{NewPaymentIn, PaymentIn, PaymentInAllocator};
use crate::payment_out::{ChequeOutcome, NewPaymentOut, PaymentOut, PaymentOutAllocator};
use crate::query::{AccountLedger, LedgerQuery};
use crate::reports::{
    AdvancePaymentsReport, CustomerPaymentInfo, DailyRegister, MethodBreakdown, Reports,
    SupplierPaymentInfo, SupplierPaymentSummary, UnappliedAdvances,
};
use crate::store::Books;
use crate::unit_of_work::UnitOfWork;

/// Thread-safe entry point to the books
pub struct LedgerEngine {
    books: RwLock<Books>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl LedgerEngine {
    /// Creates an engine with empty books and the system clock
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_books(Books::new(), config, clock)
    }

    /// Wraps books loaded from storage
    pub fn from_books(books: Books, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self { books: RwLock::new(books), clock, config, sink: None }
    }

    /// Persists every call's changes through `sink` before committing them
    pub fn with_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Copy of the current books, for persistence or inspection
    pub fn snapshot(&self) -> Result<Books, LedgerError> {
        Ok(self.read_lock()?.clone())
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Registers a bank account
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the account belongs to another
    /// owner or duplicates an existing bank and number
    pub fn open_bank_account(&self, owner: OwnerId, account: BankAccount) -> Result<BankAccount, LedgerError> {
        ensure_owner(owner, account.owner, "bank account")?;
        self.write("open_bank_account", |uow, _| {
            uow.open_bank_account(account.clone())?;
            info!(owner = %owner, bank = %account.bank_name, account = %account.masked_number(), "bank account opened");
            Ok(account)
        })
    }

    /// Deletes a bank account that nothing refers to
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` if the account does not exist
    /// - `LedgerError::AccountInUse` if any entry or payment references it
    pub fn close_bank_account(&self, owner: OwnerId, id: BankAccountId) -> Result<BankAccount, LedgerError> {
        self.write("close_bank_account", |uow, _| {
            let books = uow.books();
            let account = books.bank_accounts.get(owner, id)?;
            let referenced = books.ledger.references(&AccountRef::Bank(id))
                || books.payments_out.values().any(|p| p.bank_account == Some(id))
                || books
                    .payments_in
                    .values()
                    .any(|p| p.deposit_account == AccountRef::Bank(id));
            if referenced {
                return Err(LedgerError::AccountInUse(format!(
                    "{} {} has recorded transactions",
                    account.bank_name,
                    account.masked_number()
                )));
            }
            let removed = uow
                .remove_bank_account(id)
                .ok_or_else(|| LedgerError::not_found("Bank account", id))?;
            info!(owner = %owner, account = %id, "bank account closed");
            Ok(removed)
        })
    }

    /// Marks an account active or inactive; inactive balances leave the totals
    pub fn set_bank_account_status(
        &self,
        owner: OwnerId,
        id: BankAccountId,
        status: BankAccountStatus,
    ) -> Result<BankAccount, LedgerError> {
        self.write("set_bank_account_status", |uow, _| {
            let account = uow.bank_account_mut(owner, id)?;
            account.status = status;
            account.version += 1;
            Ok(account.clone())
        })
    }

    /// Registers a customer; the dues it arrives with become its opening dues
    pub fn register_customer(&self, owner: OwnerId, mut customer: Customer) -> Result<Customer, LedgerError> {
        ensure_owner(owner, customer.owner, "customer")?;
        customer.mark_opening_balance();
        self.write("register_customer", |uow, _| {
            if uow.books().customers.contains_key(&customer.id) {
                return Err(LedgerError::validation(format!("customer {} already exists", customer.id)));
            }
            uow.insert_customer(customer.clone());
            Ok(customer)
        })
    }

    /// Registers a supplier, seeding its advance record from the advance fields
    ///
    /// The outstanding balance it arrives with has no bills behind it and is
    /// kept as the opening payable.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` for a negative payable or an advance
    /// balance outside zero and the total given
    pub fn register_supplier(&self, owner: OwnerId, mut supplier: Supplier) -> Result<Supplier, LedgerError> {
        ensure_owner(owner, supplier.owner, "supplier")?;
        supplier.mark_opening_balance();
        self.write("register_supplier", |uow, _| {
            if uow.books().suppliers.contains_key(&supplier.id) {
                return Err(LedgerError::validation(format!("supplier {} already exists", supplier.id)));
            }
            if supplier.outstanding_balance().is_negative() {
                return Err(LedgerError::validation("opening outstanding balance cannot be negative"));
            }
            let given = supplier.total_advance_given();
            let remaining = supplier.advance_balance();
            if remaining.is_negative() || remaining > given {
                return Err(LedgerError::validation(
                    "advance balance must lie between zero and the total advance given",
                ));
            }
            if given.is_positive() {
                let seeded = SupplierAdvance::from_totals(owner, supplier.id, given, given.checked_sub(&remaining)?)?;
                *uow.advance_mut(owner, supplier.id) = seeded;
            }
            uow.insert_supplier(supplier.clone());
            Ok(supplier)
        })
    }

    /// Records a sales invoice; its open balance is added to the customer's dues
    pub fn record_invoice(&self, owner: OwnerId, invoice: Invoice) -> Result<Invoice, LedgerError> {
        ensure_owner(owner, invoice.owner, "invoice")?;
        self.write("record_invoice", |uow, _| {
            uow.books().customer(owner, invoice.customer)?;
            if uow.books().invoices.contains_key(&invoice.id) {
                return Err(LedgerError::validation(format!("invoice {} already exists", invoice.id)));
            }
            if !invoice.total_amount.is_positive() {
                return Err(LedgerError::validation("invoice total must be positive"));
            }
            let receivable = invoice.balance();
            if receivable.is_negative() {
                return Err(LedgerError::validation("paid and returned amounts exceed the invoice total"));
            }
            uow.customer_mut(owner, invoice.customer)?.adjust_dues(receivable)?;
            uow.insert_invoice(invoice.clone());
            Ok(invoice)
        })
    }

    /// Records a purchase bill; its outstanding amount is added to the supplier's
    pub fn record_bill(&self, owner: OwnerId, bill: Bill) -> Result<Bill, LedgerError> {
        ensure_owner(owner, bill.owner, "bill")?;
        self.write("record_bill", |uow, _| {
            uow.books().supplier(owner, bill.supplier)?;
            if uow.books().bills.contains_key(&bill.id) {
                return Err(LedgerError::validation(format!("bill {} already exists", bill.id)));
            }
            if !bill.total_amount.is_positive() {
                return Err(LedgerError::validation("bill total must be positive"));
            }
            if !bill.is_deleted {
                uow.supplier_mut(owner, bill.supplier)?
                    .adjust_outstanding(bill.outstanding_amount)?;
            }
            uow.insert_bill(bill.clone());
            Ok(bill)
        })
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Records a customer receipt, see [`PaymentInAllocator::allocate`]
    pub fn create_payment_in(&self, owner: OwnerId, request: NewPaymentIn) -> Result<PaymentIn, LedgerError> {
        let allocator = PaymentInAllocator::new(&self.config);
        self.write("create_payment_in", |uow, now| allocator.allocate(uow, owner, request, now))
    }

    /// Records a supplier payment, see [`PaymentOutAllocator::create`]
    pub fn create_payment_out(&self, owner: OwnerId, request: NewPaymentOut) -> Result<PaymentOut, LedgerError> {
        let allocator = PaymentOutAllocator::new(&self.config);
        self.write("create_payment_out", |uow, now| allocator.create(uow, owner, request, now))
    }

    pub fn cancel_payment_out(
        &self,
        owner: OwnerId,
        id: PaymentOutId,
        reason: Option<String>,
    ) -> Result<PaymentOut, LedgerError> {
        let allocator = PaymentOutAllocator::new(&self.config);
        self.write("cancel_payment_out", |uow, now| allocator.cancel(uow, owner, id, reason, now))
    }

    pub fn set_cheque_status(
        &self,
        owner: OwnerId,
        id: PaymentOutId,
        outcome: ChequeOutcome,
        reason: Option<String>,
    ) -> Result<PaymentOut, LedgerError> {
        let allocator = PaymentOutAllocator::new(&self.config);
        self.write("set_cheque_status", |uow, now| {
            allocator.set_cheque_status(uow, owner, id, outcome, reason, now)
        })
    }

    pub fn apply_supplier_advance(
        &self,
        owner: OwnerId,
        supplier: SupplierId,
        bill: BillId,
        amount: Money,
    ) -> Result<Bill, LedgerError> {
        let allocator = PaymentOutAllocator::new(&self.config);
        self.write("apply_supplier_advance", |uow, now| {
            allocator.apply_supplier_advance(uow, owner, supplier, bill, amount, now)
        })
    }

    // ------------------------------------------------------------------
    // Cash and bank
    // ------------------------------------------------------------------

    pub fn create_transfer(&self, owner: OwnerId, request: TransferRequest) -> Result<LedgerEntry, LedgerError> {
        self.write("create_transfer", |uow, now| cashbank::transfer(uow, owner, request, now))
    }

    pub fn create_cash_transaction(
        &self,
        owner: OwnerId,
        request: CashTransactionRequest,
    ) -> Result<LedgerEntry, LedgerError> {
        self.write("create_cash_transaction", |uow, now| {
            cashbank::cash_transaction(uow, owner, request, now)
        })
    }

    pub fn toggle_reconciliation(&self, owner: OwnerId, id: LedgerEntryId) -> Result<LedgerEntry, LedgerError> {
        self.write("toggle_reconciliation", |uow, now| {
            cashbank::toggle_reconciliation(uow, owner, id, now)
        })
    }

    pub fn bulk_reconcile(
        &self,
        owner: OwnerId,
        ids: &[LedgerEntryId],
        reconciled: bool,
    ) -> Result<usize, LedgerError> {
        self.write("bulk_reconcile", |uow, now| {
            cashbank::bulk_reconcile(uow, owner, ids, reconciled, now)
        })
    }

    pub fn cash_balance(&self, owner: OwnerId) -> Result<Money, LedgerError> {
        self.read_lock()?.ledger.cash_balance(owner)
    }

    pub fn cash_bank_position(&self, owner: OwnerId) -> Result<CashBankPosition, LedgerError> {
        cashbank::position(&*self.read_lock()?, owner)
    }

    pub fn bank_summary(&self, owner: OwnerId) -> Result<BankSummary, LedgerError> {
        cashbank::bank_summary(&*self.read_lock()?, owner)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn account_ledger(
        &self,
        owner: OwnerId,
        account: &AccountRef,
        range: DateRange,
        reconciled: Option<bool>,
    ) -> Result<AccountLedger, LedgerError> {
        let books = self.read_lock()?;
        LedgerQuery::new(&books, &self.config.timezone).account_ledger(owner, account, range, reconciled)
    }

    /// Active entries touching `account`, newest first
    pub fn account_transactions(&self, owner: OwnerId, account: &AccountRef) -> Result<Vec<LedgerEntry>, LedgerError> {
        let books = self.read_lock()?;
        LedgerQuery::new(&books, &self.config.timezone).transactions(owner, account)
    }

    /// Every entry of the owner including voided pairs, in insertion order
    pub fn audit_trail(&self, owner: OwnerId) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.read_lock()?.ledger.audit_trail(owner).cloned().collect())
    }

    pub fn bank_account(&self, owner: OwnerId, id: BankAccountId) -> Result<BankAccount, LedgerError> {
        Ok(self.read_lock()?.bank_accounts.get(owner, id)?.clone())
    }

    pub fn customer(&self, owner: OwnerId, id: CustomerId) -> Result<Customer, LedgerError> {
        Ok(self.read_lock()?.customer(owner, id)?.clone())
    }

    pub fn supplier(&self, owner: OwnerId, id: SupplierId) -> Result<Supplier, LedgerError> {
        Ok(self.read_lock()?.supplier(owner, id)?.clone())
    }

    pub fn invoice(&self, owner: OwnerId, id: InvoiceId) -> Result<Invoice, LedgerError> {
        Ok(self.read_lock()?.invoice(owner, id)?.clone())
    }

    pub fn bill(&self, owner: OwnerId, id: BillId) -> Result<Bill, LedgerError> {
        Ok(self.read_lock()?.bill(owner, id)?.clone())
    }

    pub fn payment_in(&self, owner: OwnerId, id: PaymentInId) -> Result<PaymentIn, LedgerError> {
        Ok(self.read_lock()?.payment_in(owner, id)?.clone())
    }

    pub fn payment_out(&self, owner: OwnerId, id: PaymentOutId) -> Result<PaymentOut, LedgerError> {
        Ok(self.read_lock()?.payment_out(owner, id)?.clone())
    }

    pub fn supplier_advance(&self, owner: OwnerId, supplier: SupplierId) -> Result<Option<SupplierAdvance>, LedgerError> {
        Ok(self.read_lock()?.advances.get(owner, supplier).cloned())
    }

    // ------------------------------------------------------------------
    // Audit and reports
    // ------------------------------------------------------------------

    /// Recomputes derived balances for one owner and reports drift
    pub fn audit(&self, owner: OwnerId) -> Result<DriftReport, LedgerError> {
        let books = self.read_lock()?;
        audit::audit(&books, owner, self.clock.now())
    }

    /// Owners with anything on the books
    pub fn owners(&self) -> Result<Vec<OwnerId>, LedgerError> {
        let books = self.read_lock()?;
        let mut owners = BTreeSet::new();
        owners.extend(books.bank_accounts.owners());
        owners.extend(books.customers.values().map(|c| c.owner));
        owners.extend(books.suppliers.values().map(|s| s.owner));
        owners.extend(books.ledger.owners());
        Ok(owners.into_iter().collect())
    }

    pub fn pending_cheques(&self, owner: OwnerId) -> Result<Vec<PaymentOut>, LedgerError> {
        self.reports(|r| Ok(r.pending_cheques(owner)))
    }

    pub fn supplier_outstanding_bills(&self, owner: OwnerId, supplier: SupplierId) -> Result<Vec<Bill>, LedgerError> {
        self.reports(|r| r.supplier_outstanding_bills(owner, supplier))
    }

    pub fn supplier_payment_info(&self, owner: OwnerId, supplier: SupplierId) -> Result<SupplierPaymentInfo, LedgerError> {
        self.reports(|r| r.supplier_payment_info(owner, supplier))
    }

    pub fn customer_outstanding_invoices(&self, owner: OwnerId, customer: CustomerId) -> Result<Vec<Invoice>, LedgerError> {
        self.reports(|r| r.customer_outstanding_invoices(owner, customer))
    }

    pub fn customer_payment_info(&self, owner: OwnerId, customer: CustomerId) -> Result<CustomerPaymentInfo, LedgerError> {
        self.reports(|r| r.customer_payment_info(owner, customer))
    }

    pub fn customer_activity(&self, owner: OwnerId, customer: CustomerId) -> Result<Vec<ActivityEntry>, LedgerError> {
        self.reports(|r| r.customer_activity(owner, customer))
    }

    pub fn supplier_summary(&self, owner: OwnerId, range: DateRange) -> Result<Vec<SupplierPaymentSummary>, LedgerError> {
        self.reports(|r| r.supplier_summary(owner, range))
    }

    pub fn date_wise_register(&self, owner: OwnerId, range: DateRange) -> Result<Vec<DailyRegister>, LedgerError> {
        self.reports(|r| r.date_wise_register(owner, range))
    }

    pub fn method_breakdown(&self, owner: OwnerId, range: DateRange) -> Result<Vec<MethodBreakdown>, LedgerError> {
        self.reports(|r| r.method_breakdown(owner, range))
    }

    pub fn advance_payments(&self, owner: OwnerId, range: DateRange) -> Result<AdvancePaymentsReport, LedgerError> {
        self.reports(|r| r.advance_payments(owner, range))
    }

    pub fn unapplied_advances(&self, owner: OwnerId) -> Result<UnappliedAdvances, LedgerError> {
        self.reports(|r| r.unapplied_advances(owner))
    }

    fn reports<T>(&self, f: impl FnOnce(&Reports<'_>) -> Result<T, LedgerError>) -> Result<T, LedgerError> {
        let books = self.read_lock()?;
        f(&Reports::new(&books, &self.config.timezone))
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, Books>, LedgerError> {
        self.books
            .read()
            .map_err(|_| LedgerError::StoreUnavailable("books lock poisoned".to_string()))
    }

    /// Runs `f` in a unit of work under the write lock
    fn write<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut UnitOfWork<'_>, DateTime<Utc>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut books = self
            .books
            .write()
            .map_err(|_| LedgerError::StoreUnavailable("books lock poisoned".to_string()))?;
        let now = self.clock.now();
        let mut uow = UnitOfWork::begin(&mut books);
        match f(&mut uow, now) {
            Ok(value) => {
                if let Some(sink) = &self.sink {
                    let changes = uow.changes();
                    if !changes.is_empty() {
                        if let Err(e) = sink.persist(operation, &changes) {
                            let steps = uow.rollback();
                            warn!(operation, steps, error = %e, "persistence failed, operation rolled back");
                            return Err(e);
                        }
                    }
                }
                uow.commit();
                Ok(value)
            }
            Err(e) => {
                let steps = uow.rollback();
                debug!(operation, steps, error = %e, "operation rolled back");
                Err(e)
            }
        }
    }
}

fn ensure_owner(caller: OwnerId, record_owner: OwnerId, what: &str) -> Result<(), LedgerError> {
    if caller != record_owner {
        return Err(LedgerError::validation(format!("{} belongs to another owner", what)));
    }
    Ok(())
}
