//! Customer receipts
//!
//! A receipt is paid with one or more methods, may draw on the customer's
//! existing credit, and is allocated against open invoices. Whatever is not
//! allocated becomes new customer credit, so for every receipt:
//!
//! `total_allocated + excess_amount == total_amount + credit_applied`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use core_kernel::{
    ActivityEntryId, BankAccountId, CustomerId, InvoiceId, LedgerEntryId, Money, OwnerId,
    PaymentInId,
};

use crate::account_ref::{AccountRef, ExternalCategory};
use crate::activity::{ActivityEntry, ActivityMethod};
use crate::config::EngineConfig;
use crate::error::LedgerError;
use crate::ledger::{EntryKind, NewEntry};
use crate::method::PaymentMethod;
use crate::unit_of_work::UnitOfWork;

/// One tender line of a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub method: PaymentMethod,
    pub amount: Money,
    /// Bank account the customer paid into, if recorded
    pub bank_account: Option<BankAccountId>,
    pub reference: Option<String>,
}

impl ReceiptLine {
    pub fn new(method: PaymentMethod, amount: Money) -> Self {
        Self { method, amount, bank_account: None, reference: None }
    }

    pub fn with_bank_account(mut self, bank_account: BankAccountId) -> Self {
        self.bank_account = Some(bank_account);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Requested allocation of part of a receipt to an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAllocationRequest {
    pub invoice: InvoiceId,
    pub amount: Money,
    /// Invoice version the caller based the allocation on
    pub expected_version: Option<u64>,
}

/// Input of [`PaymentInAllocator::allocate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPaymentIn {
    pub customer: CustomerId,
    pub methods: Vec<ReceiptLine>,
    pub allocations: Vec<InvoiceAllocationRequest>,
    pub credit_applied: Money,
    pub deposit_account: AccountRef,
    /// Defaults to the time of recording
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl NewPaymentIn {
    pub fn new(customer: CustomerId, deposit_account: AccountRef) -> Self {
        Self {
            customer,
            methods: Vec::new(),
            allocations: Vec::new(),
            credit_applied: Money::ZERO,
            deposit_account,
            payment_date: None,
            notes: None,
        }
    }

    pub fn with_method(mut self, line: ReceiptLine) -> Self {
        self.methods.push(line);
        self
    }

    pub fn allocate(mut self, invoice: InvoiceId, amount: Money) -> Self {
        self.allocations.push(InvoiceAllocationRequest { invoice, amount, expected_version: None });
        self
    }

    /// Allocates against the invoice only if it is still at `version`
    pub fn allocate_at_version(mut self, invoice: InvoiceId, amount: Money, version: u64) -> Self {
        self.allocations.push(InvoiceAllocationRequest {
            invoice,
            amount,
            expected_version: Some(version),
        });
        self
    }

    pub fn with_credit(mut self, credit_applied: Money) -> Self {
        self.credit_applied = credit_applied;
        self
    }

    pub fn on_date(mut self, payment_date: DateTime<Utc>) -> Self {
        self.payment_date = Some(payment_date);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sum of every tender line
    pub fn total_amount(&self) -> Result<Money, LedgerError> {
        let amounts: Vec<Money> = self.methods.iter().map(|m| m.amount).collect();
        Ok(Money::checked_sum(&amounts)?)
    }
}

/// An applied invoice allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAllocation {
    pub invoice: InvoiceId,
    pub invoice_no: String,
    pub amount: Money,
    /// Invoice balance just before this line was applied
    pub balance_before: Money,
}

/// A recorded customer receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIn {
    pub id: PaymentInId,
    pub receipt_number: String,
    pub owner: OwnerId,
    pub customer: CustomerId,
    pub payment_date: DateTime<Utc>,
    pub total_amount: Money,
    pub payment_methods: Vec<ReceiptLine>,
    pub allocations: Vec<InvoiceAllocation>,
    pub credit_applied: Money,
    pub excess_amount: Money,
    pub deposit_account: AccountRef,
    pub ledger_entry: LedgerEntryId,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentIn {
    pub fn total_allocated(&self) -> Money {
        self.allocations.iter().map(|a| a.amount).sum()
    }

    /// Label used on the activity log for the allocated part
    pub fn activity_method(&self) -> ActivityMethod {
        match self.payment_methods.as_slice() {
            [single] => single.method.into(),
            _ => ActivityMethod::Split,
        }
    }
}

/// Validates and applies customer receipts
pub struct PaymentInAllocator<'c> {
    config: &'c EngineConfig,
}

impl<'c> PaymentInAllocator<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Records a receipt inside `uow`
    ///
    /// Everything is validated before the first mutation. Invoices are paid,
    /// the customer's dues move by `credit - allocated - excess`, activity
    /// lines are written, and one `in` entry moves the total from the outside
    /// world into the deposit account.
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` for an unknown customer, invoice or bank account
    /// - `LedgerError::Validation` for malformed tender lines or a non-liquid deposit account
    /// - `LedgerError::CreditExceedsAvailable` when drawing more credit than the customer holds
    /// - `LedgerError::AllocationExceedsBalance` when an invoice would be overpaid
    /// - `LedgerError::OverAllocation` when allocations exceed payment plus credit
    /// - `LedgerError::ConcurrencyConflict` when an invoice moved past the expected version
    pub fn allocate(
        &self,
        uow: &mut UnitOfWork<'_>,
        owner: OwnerId,
        request: NewPaymentIn,
        now: DateTime<Utc>,
    ) -> Result<PaymentIn, LedgerError> {
        let books = uow.books();
        let customer = books.customer(owner, request.customer)?;
        let customer_name = customer.name.clone();
        let available_credit = customer.available_credit();

        if request.methods.is_empty() {
            return Err(LedgerError::validation("at least one payment method is required"));
        }
        for line in &request.methods {
            if !line.amount.is_positive() {
                return Err(LedgerError::validation(format!(
                    "payment method {} must have a positive amount",
                    line.method
                )));
            }
            if let Some(bank) = line.bank_account {
                books.bank_accounts.get_active(owner, bank)?;
            }
        }
        let total_amount = request.total_amount()?;

        books.require_liquid(owner, &request.deposit_account)?;

        let credit_applied = request.credit_applied;
        if credit_applied.is_negative() {
            return Err(LedgerError::validation("credit applied cannot be negative"));
        }
        if credit_applied > available_credit {
            return Err(LedgerError::CreditExceedsAvailable {
                available: available_credit.amount(),
                requested: credit_applied.amount(),
            });
        }

        let mut per_invoice: HashMap<InvoiceId, Money> = HashMap::new();
        for line in &request.allocations {
            if !line.amount.is_positive() {
                return Err(LedgerError::validation("allocated amount must be greater than zero"));
            }
            let invoice = books.invoice(owner, line.invoice)?;
            if invoice.customer != request.customer {
                return Err(LedgerError::not_found("Invoice", line.invoice));
            }
            if let Some(expected) = line.expected_version {
                if invoice.version != expected {
                    return Err(LedgerError::ConcurrencyConflict {
                        entity: "Invoice",
                        id: invoice.id.to_string(),
                        expected,
                        actual: invoice.version,
                    });
                }
            }
            let requested = per_invoice.entry(line.invoice).or_insert(Money::ZERO);
            *requested = requested.checked_add(&line.amount)?;
            let balance = invoice.balance();
            if *requested > balance {
                return Err(LedgerError::AllocationExceedsBalance {
                    document: invoice.invoice_no.clone(),
                    balance: balance.amount(),
                    requested: requested.amount(),
                });
            }
        }

        let line_amounts: Vec<Money> = request.allocations.iter().map(|a| a.amount).collect();
        let total_allocated = Money::checked_sum(&line_amounts)?;
        let effective = total_amount.checked_add(&credit_applied)?;
        if total_allocated > effective {
            return Err(LedgerError::OverAllocation {
                allocated: total_allocated.amount(),
                available: effective.amount(),
            });
        }
        let excess_amount = effective.checked_sub(&total_allocated)?.clamp_non_negative();

        // Validation done, apply.
        let payment_date = request.payment_date.unwrap_or(now);
        let receipt_number = uow.next_number(
            owner,
            &self.config.receipt_prefix,
            self.config.timezone.local_date(payment_date),
        );
        let id = PaymentInId::new_v7();

        let mut allocations = Vec::with_capacity(request.allocations.len());
        for line in &request.allocations {
            let invoice = uow.invoice_mut(owner, line.invoice)?;
            let balance_before = invoice.balance();
            invoice.apply_payment(line.amount)?;
            allocations.push(InvoiceAllocation {
                invoice: invoice.id,
                invoice_no: invoice.invoice_no.clone(),
                amount: line.amount,
                balance_before,
            });
        }

        let dues_delta = credit_applied
            .checked_sub(&total_allocated)?
            .checked_sub(&excess_amount)?;
        uow.customer_mut(owner, request.customer)?.adjust_dues(dues_delta)?;

        let entry = uow.post_entry(
            NewEntry::new(
                owner,
                EntryKind::In,
                total_amount,
                AccountRef::External(ExternalCategory::external()),
                request.deposit_account.clone(),
                payment_date,
            )
            .with_description(format!(
                "Payment In - Receipt {} - Customer: {}",
                receipt_number, customer_name
            ))
            .with_reference(Some(receipt_number.clone())),
            now,
        )?;

        let payment = PaymentIn {
            id,
            receipt_number,
            owner,
            customer: request.customer,
            payment_date,
            total_amount,
            payment_methods: request.methods,
            allocations,
            credit_applied,
            excess_amount,
            deposit_account: request.deposit_account,
            ledger_entry: entry.id,
            notes: request.notes,
            created_at: now,
        };

        self.record_activity(uow, &payment, total_allocated, now);
        uow.insert_payment_in(payment.clone());

        info!(
            owner = %owner,
            receipt = %payment.receipt_number,
            total = %payment.total_amount,
            allocated = %total_allocated,
            excess = %payment.excess_amount,
            "payment in recorded"
        );

        Ok(payment)
    }

    fn record_activity(
        &self,
        uow: &mut UnitOfWork<'_>,
        payment: &PaymentIn,
        total_allocated: Money,
        now: DateTime<Utc>,
    ) {
        let receipt = &payment.receipt_number;
        let lines = [
            (
                total_allocated,
                payment.activity_method(),
                format!("Payment received - Receipt {}", receipt),
            ),
            (
                payment.credit_applied,
                ActivityMethod::Credit,
                format!("Customer credit applied - Receipt {}", receipt),
            ),
            (
                -payment.excess_amount,
                ActivityMethod::Credit,
                format!("Excess payment - Customer credit created - Receipt {}", receipt),
            ),
        ];

        for (amount, method, description) in lines {
            if amount.is_zero() {
                continue;
            }
            uow.push_activity(ActivityEntry {
                id: ActivityEntryId::new_v7(),
                owner: payment.owner,
                customer: payment.customer,
                payment_in: payment.id,
                amount,
                method,
                description,
                created_at: now,
            });
        }
    }
}
