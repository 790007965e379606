//! Ledger Domain - Cash/Bank Ledger and Payment Allocation
//!
//! This crate keeps a small business's liquid money and its settlements
//! with customers and suppliers consistent.
//!
//! # Model
//!
//! Money moves along a directional transfer: every [`LedgerEntry`] takes an
//! amount out of one [`AccountRef`] and puts it into another. An account is
//! cash in hand, an owned bank account, or an external category such as
//! `"external"` or `"supplier-payment"`.
//!
//! - Cash in hand is never stored; it is summed from the log on demand
//! - Bank balances are cached in [`AccountBalanceCache`], the only writer of
//!   `current_balance`
//! - Cancelling an entry appends a compensating entry; voided pairs drop out
//!   of balances and statements but stay in the audit trail
//!
//! # Settlements
//!
//! - [`PaymentInAllocator`] records customer receipts against invoices and
//!   customer credit
//! - [`PaymentOutAllocator`] records supplier payments against bills and
//!   advances, including the cheque lifecycle
//! - [`AdvanceLedger`] tracks money paid to suppliers ahead of bills
//!
//! Every mutating call runs in a [`UnitOfWork`]: it either commits as a whole
//! or leaves the books exactly as they were. A [`ChangeSink`] attached to the
//! engine receives each call's [`ChangeSet`] before the commit.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{LedgerEngine, EngineConfig, NewPaymentIn, ReceiptLine, PaymentMethod, AccountRef};
//!
//! let engine = LedgerEngine::new(EngineConfig::default());
//! let receipt = engine.create_payment_in(
//!     owner,
//!     NewPaymentIn::new(customer, AccountRef::Bank(bank))
//!         .with_method(ReceiptLine::new(PaymentMethod::Cash, amount))
//!         .allocate(invoice, amount),
//! )?;
//! ```

pub mod account_ref;
pub mod activity;
pub mod advance;
pub mod audit;
pub mod balance;
pub mod bill;
pub mod cashbank;
pub mod changes;
pub mod cheque;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod method;
pub mod numbering;
pub mod parties;
pub mod payment_in;
pub mod payment_out;
pub mod query;
pub mod reports;
pub mod store;
pub mod unit_of_work;

pub use account_ref::{AccountRef, ExternalCategory, CASH};
pub use activity::{ActivityEntry, ActivityMethod};
pub use advance::{AdvanceApplication, AdvanceLedger, SupplierAdvance};
pub use audit::{Drift, DriftKind, DriftReport};
pub use balance::{AccountBalanceCache, BankAccount, BankAccountStatus, BankAccountType};
pub use bill::{Bill, BillAction, BillAuditEntry};
pub use cashbank::{
    BankSummary, CashBankPosition, CashDirection, CashTransactionRequest, TransferRequest,
};
pub use changes::{ChangeSet, ChangeSink};
pub use cheque::{ChequeDetails, PaymentOutStatus, StatusEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::LedgerEngine;
pub use error::{ErrorKind, LedgerError};
pub use invoice::{Invoice, PaymentStatus};
pub use ledger::{EntryKind, LedgerEntry, NewEntry, TransactionLedger};
pub use method::PaymentMethod;
pub use parties::{Customer, Supplier};
pub use payment_in::{InvoiceAllocation, NewPaymentIn, PaymentIn, PaymentInAllocator, ReceiptLine};
pub use payment_out::{
    BillAllocation, ChequeOutcome, NewPaymentOut, PaymentOut, PaymentOutAction, PaymentOutAllocator,
    PaymentOutAuditEntry,
};
pub use query::{AccountLedger, LedgerQuery, LedgerRow, LedgerSummary, RowDirection};
pub use reports::Reports;
pub use store::Books;
pub use unit_of_work::UnitOfWork;
