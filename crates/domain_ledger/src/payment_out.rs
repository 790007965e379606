//! Supplier disbursements
//!
//! A payment out settles supplier bills and may put money on account as an
//! advance. Non-cheque payments hit the ledger immediately. Cheques sit in
//! `pending` without a ledger entry until they clear; a bounce or a
//! cancellation undoes every bill, supplier and advance effect exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use core_kernel::{BankAccountId, BillId, LedgerEntryId, Money, OwnerId, PaymentOutId, SupplierId};

use crate::account_ref::{AccountRef, ExternalCategory};
use crate::advance::AdvanceApplication;
use crate::bill::{Bill, BillAction};
use crate::cheque::{ChequeDetails, PaymentOutStatus, StatusEvent};
use crate::config::EngineConfig;
use crate::error::LedgerError;
use crate::ledger::{EntryKind, NewEntry};
use crate::method::PaymentMethod;
use crate::unit_of_work::UnitOfWork;

/// Requested allocation of part of a payment to a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillAllocationRequest {
    pub bill: BillId,
    pub amount: Money,
    /// Bill version the caller based the allocation on
    pub expected_version: Option<u64>,
}

/// Input of [`PaymentOutAllocator::create`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPaymentOut {
    pub supplier: SupplierId,
    pub total_amount: Money,
    pub method: PaymentMethod,
    pub bank_account: Option<BankAccountId>,
    pub cheque: Option<ChequeDetails>,
    pub allocations: Vec<BillAllocationRequest>,
    pub advance_amount: Money,
    pub reference: Option<String>,
    pub notes: Option<String>,
    /// Defaults to the time of recording
    pub payment_date: Option<DateTime<Utc>>,
}

impl NewPaymentOut {
    pub fn new(supplier: SupplierId, total_amount: Money, method: PaymentMethod) -> Self {
        Self {
            supplier,
            total_amount,
            method,
            bank_account: None,
            cheque: None,
            allocations: Vec::new(),
            advance_amount: Money::ZERO,
            reference: None,
            notes: None,
            payment_date: None,
        }
    }

    pub fn from_bank(mut self, bank_account: BankAccountId) -> Self {
        self.bank_account = Some(bank_account);
        self
    }

    pub fn with_cheque(mut self, cheque: ChequeDetails) -> Self {
        self.cheque = Some(cheque);
        self
    }

    pub fn allocate(mut self, bill: BillId, amount: Money) -> Self {
        self.allocations.push(BillAllocationRequest { bill, amount, expected_version: None });
        self
    }

    /// Allocates against the bill only if it is still at `version`
    pub fn allocate_at_version(mut self, bill: BillId, amount: Money, version: u64) -> Self {
        self.allocations.push(BillAllocationRequest {
            bill,
            amount,
            expected_version: Some(version),
        });
        self
    }

    pub fn with_advance(mut self, advance_amount: Money) -> Self {
        self.advance_amount = advance_amount;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn on_date(mut self, payment_date: DateTime<Utc>) -> Self {
        self.payment_date = Some(payment_date);
        self
    }

    fn source_account(&self) -> AccountRef {
        match self.bank_account {
            Some(id) if self.method.requires_bank_account() => AccountRef::Bank(id),
            _ => AccountRef::Cash,
        }
    }
}

/// An applied bill allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillAllocation {
    pub bill: BillId,
    pub bill_no: String,
    pub amount: Money,
    /// Bill outstanding just before this line was applied
    pub outstanding_before: Money,
}

/// Kind of change recorded in a payment's audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutAction {
    Created,
    ChequeCleared,
    ChequeBounced,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutAuditEntry {
    pub action: PaymentOutAction,
    pub performed_by: OwnerId,
    pub at: DateTime<Utc>,
    pub details: String,
}

/// A recorded supplier payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOut {
    pub id: PaymentOutId,
    pub payment_no: String,
    pub owner: OwnerId,
    pub supplier: SupplierId,
    pub payment_date: DateTime<Utc>,
    pub total_amount: Money,
    pub method: PaymentMethod,
    pub bank_account: Option<BankAccountId>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub cheque: Option<ChequeDetails>,
    pub allocations: Vec<BillAllocation>,
    pub total_allocated_to_bills: Money,
    pub advance_amount: Money,
    pub status: PaymentOutStatus,
    /// Entry that moved the money, absent for uncleared cheques
    pub ledger_entry: Option<LedgerEntryId>,
    /// Compensating entry written on cancellation
    pub reversal_entry: Option<LedgerEntryId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub audit_log: Vec<PaymentOutAuditEntry>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl PaymentOut {
    /// Part of the payment neither allocated to bills nor kept as advance
    pub fn unallocated(&self) -> Money {
        self.total_amount - self.total_allocated_to_bills - self.advance_amount
    }

    /// Account the money leaves from
    pub fn source_account(&self) -> AccountRef {
        match self.bank_account {
            Some(id) => AccountRef::Bank(id),
            None => AccountRef::Cash,
        }
    }

    /// Text put on the ledger entry reference
    pub fn entry_reference(&self) -> String {
        self.reference
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| self.payment_no.clone())
    }

    fn push_audit(&mut self, action: PaymentOutAction, by: OwnerId, details: String, at: DateTime<Utc>) {
        self.audit_log.push(PaymentOutAuditEntry { action, performed_by: by, at, details });
        self.version += 1;
    }
}

/// Result a bank reports for a presented cheque
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChequeOutcome {
    Cleared,
    Bounced,
}

impl ChequeOutcome {
    pub fn event(&self) -> StatusEvent {
        match self {
            ChequeOutcome::Cleared => StatusEvent::Clear,
            ChequeOutcome::Bounced => StatusEvent::Bounce,
        }
    }
}

/// Validates, applies and reverses supplier payments
pub struct PaymentOutAllocator<'c> {
    config: &'c EngineConfig,
}

impl<'c> PaymentOutAllocator<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Records a supplier payment inside `uow`
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` for an unknown supplier, bill or bank account
    /// - `LedgerError::Validation` for bad amounts or method rules
    /// - `LedgerError::InsufficientFunds` when a non-cheque source cannot cover the total
    /// - `LedgerError::AllocationExceedsBalance` when a bill would be overpaid
    /// - `LedgerError::OverAllocation` when bills plus advance exceed the total
    /// - `LedgerError::DuplicateReference` when the reference is already used on the bank account
    /// - `LedgerError::ConcurrencyConflict` when a bill moved past the expected version
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let payment = PaymentOutAllocator::new(&config).create(
    ///     &mut uow,
    ///     owner,
    ///     NewPaymentOut::new(supplier, amount, PaymentMethod::Upi)
    ///         .from_bank(bank)
    ///         .allocate(bill, amount),
    ///     now,
    /// )?;
    /// ```
    pub fn create(
        &self,
        uow: &mut UnitOfWork<'_>,
        owner: OwnerId,
        request: NewPaymentOut,
        now: DateTime<Utc>,
    ) -> Result<PaymentOut, LedgerError> {
        let books = uow.books();
        let supplier_name = books.supplier(owner, request.supplier)?.business_name.clone();

        if !request.total_amount.is_positive() {
            return Err(LedgerError::validation("payment amount must be greater than zero"));
        }
        if request.advance_amount.is_negative() {
            return Err(LedgerError::validation("advance amount cannot be negative"));
        }

        if request.method.requires_bank_account() {
            let bank = request.bank_account.ok_or_else(|| {
                LedgerError::validation(format!("bank account is required for {} payments", request.method))
            })?;
            books.bank_accounts.get_active(owner, bank)?;
        } else if request.bank_account.is_some() {
            return Err(LedgerError::validation("cash payments cannot draw on a bank account"));
        }

        let source = request.source_account();
        if !request.method.is_cheque() {
            books.ensure_sufficient(owner, &source, request.total_amount)?;
        }

        let cheque = if request.method.is_cheque() {
            let cheque = request.cheque.clone().ok_or_else(|| {
                LedgerError::validation("cheque number and date are required for cheque payments")
            })?;
            cheque.validate()?;
            Some(cheque)
        } else {
            None
        };

        let mut per_bill: HashMap<BillId, Money> = HashMap::new();
        for line in &request.allocations {
            if !line.amount.is_positive() {
                return Err(LedgerError::validation("allocated amount must be greater than zero"));
            }
            let bill = books.bill(owner, line.bill)?;
            if bill.supplier != request.supplier || bill.is_deleted {
                return Err(LedgerError::not_found("Bill", line.bill));
            }
            if let Some(expected) = line.expected_version {
                if bill.version != expected {
                    return Err(LedgerError::ConcurrencyConflict {
                        entity: "Bill",
                        id: bill.id.to_string(),
                        expected,
                        actual: bill.version,
                    });
                }
            }
            let requested = per_bill.entry(line.bill).or_insert(Money::ZERO);
            *requested = requested.checked_add(&line.amount)?;
            if *requested > bill.outstanding_amount {
                return Err(LedgerError::AllocationExceedsBalance {
                    document: bill.bill_no.clone(),
                    balance: bill.outstanding_amount.amount(),
                    requested: requested.amount(),
                });
            }
        }

        let line_amounts: Vec<Money> = request.allocations.iter().map(|a| a.amount).collect();
        let total_to_bills = Money::checked_sum(&line_amounts)?;
        let committed = total_to_bills.checked_add(&request.advance_amount)?;
        if committed > request.total_amount {
            return Err(LedgerError::OverAllocation {
                allocated: committed.amount(),
                available: request.total_amount.amount(),
            });
        }

        let reference = request.reference.clone().filter(|r| !r.trim().is_empty());
        if let (Some(reference), Some(bank)) = (&reference, request.bank_account) {
            let duplicate = books.payments_out.values().any(|p| {
                p.owner == owner
                    && p.bank_account == Some(bank)
                    && p.reference.as_deref() == Some(reference.as_str())
                    && p.status != PaymentOutStatus::Cancelled
            });
            if duplicate {
                return Err(LedgerError::DuplicateReference { reference: reference.clone() });
            }
        }

        // Validation done, apply.
        let payment_date = request.payment_date.unwrap_or(now);
        let payment_no = uow.next_number(
            owner,
            &self.config.payment_out_prefix,
            self.config.timezone.local_date(payment_date),
        );
        let id = PaymentOutId::new_v7();
        let status = if request.method.is_cheque() {
            PaymentOutStatus::Pending
        } else {
            PaymentOutStatus::Completed
        };

        let mut allocations = Vec::with_capacity(request.allocations.len());
        for line in &request.allocations {
            let bill = uow.bill_mut(owner, line.bill)?;
            let outstanding_before = bill.outstanding_amount;
            bill.apply_payment(
                line.amount,
                BillAction::PaymentApplied,
                Some(id),
                format!("Payment {}", payment_no),
                now,
            )?;
            allocations.push(BillAllocation {
                bill: bill.id,
                bill_no: bill.bill_no.clone(),
                amount: line.amount,
                outstanding_before,
            });
        }

        let supplier = uow.supplier_mut(owner, request.supplier)?;
        supplier.adjust_outstanding(-total_to_bills)?;
        if request.advance_amount.is_positive() {
            supplier.give_advance(request.advance_amount)?;
            uow.advance_mut(owner, request.supplier)
                .add_advance(request.advance_amount)?;
        }

        let mut payment = PaymentOut {
            id,
            payment_no,
            owner,
            supplier: request.supplier,
            payment_date,
            total_amount: request.total_amount,
            method: request.method,
            bank_account: request.bank_account,
            reference,
            notes: request.notes,
            cheque,
            allocations,
            total_allocated_to_bills: total_to_bills,
            advance_amount: request.advance_amount,
            status,
            ledger_entry: None,
            reversal_entry: None,
            cancelled_at: None,
            cancellation_reason: None,
            audit_log: Vec::new(),
            version: 0,
            created_at: now,
        };
        payment.push_audit(
            PaymentOutAction::Created,
            owner,
            format!("Payment created via {}", payment.method),
            now,
        );

        if !payment.method.is_cheque() {
            let entry = uow.post_entry(
                NewEntry::new(
                    owner,
                    EntryKind::Out,
                    payment.total_amount,
                    source,
                    AccountRef::External(ExternalCategory::supplier_payment()),
                    payment_date,
                )
                .with_description(format!("Payment to {} - {}", supplier_name, payment.payment_no))
                .with_reference(Some(payment.entry_reference())),
                now,
            )?;
            payment.ledger_entry = Some(entry.id);
        }

        uow.insert_payment_out(payment.clone());

        info!(
            owner = %owner,
            payment_no = %payment.payment_no,
            method = %payment.method,
            total = %payment.total_amount,
            to_bills = %payment.total_allocated_to_bills,
            advance = %payment.advance_amount,
            status = %payment.status,
            "payment out recorded"
        );

        Ok(payment)
    }

    /// Records the bank's verdict on a pending cheque
    ///
    /// Clearing writes the deferred ledger entry dated `now` without a funds
    /// check. Bouncing reverses the bill, supplier and advance effects.
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` if the payment is missing or not a cheque
    /// - `LedgerError::InvalidStatusTransition` unless the cheque is pending
    /// - `LedgerError::InsufficientAdvance` if a bounced cheque's advance was already used
    pub fn set_cheque_status(
        &self,
        uow: &mut UnitOfWork<'_>,
        owner: OwnerId,
        id: PaymentOutId,
        outcome: ChequeOutcome,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PaymentOut, LedgerError> {
        let payment = uow.books().payment_out(owner, id)?.clone();
        if !payment.method.is_cheque() {
            return Err(LedgerError::not_found("Cheque payment", id));
        }
        let next = payment.status.transition(outcome.event())?;

        let updated = match outcome {
            ChequeOutcome::Cleared => {
                let supplier_name = uow.books().supplier(owner, payment.supplier)?.business_name.clone();
                let entry = uow.post_entry(
                    NewEntry::new(
                        owner,
                        EntryKind::Out,
                        payment.total_amount,
                        payment.source_account(),
                        AccountRef::External(ExternalCategory::supplier_payment()),
                        now,
                    )
                    .with_description(format!(
                        "Cheque cleared - Payment to {} - {}",
                        supplier_name, payment.payment_no
                    ))
                    .with_reference(Some(payment.entry_reference())),
                    now,
                )?;

                let record = uow.payment_out_mut(owner, id)?;
                record.status = next;
                record.ledger_entry = Some(entry.id);
                if let Some(cheque) = record.cheque.as_mut() {
                    cheque.cleared_at = Some(now);
                }
                record.push_audit(
                    PaymentOutAction::ChequeCleared,
                    owner,
                    "Cheque marked as cleared".to_string(),
                    now,
                );
                record.clone()
            }
            ChequeOutcome::Bounced => {
                self.reverse_effects(uow, &payment, "Cheque bounced", now)?;

                let record = uow.payment_out_mut(owner, id)?;
                record.status = next;
                if let Some(cheque) = record.cheque.as_mut() {
                    cheque.bounced_at = Some(now);
                    cheque.bounce_reason = reason.clone();
                }
                record.push_audit(
                    PaymentOutAction::ChequeBounced,
                    owner,
                    format!(
                        "Cheque bounced. Reason: {}",
                        reason.as_deref().unwrap_or("No reason provided")
                    ),
                    now,
                );
                record.clone()
            }
        };

        info!(
            owner = %owner,
            payment_no = %updated.payment_no,
            status = %updated.status,
            "cheque status updated"
        );

        Ok(updated)
    }

    /// Cancels a payment and undoes everything it did
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` if the payment does not exist
    /// - `LedgerError::AlreadyCancelled` if it was cancelled before
    /// - `LedgerError::InvalidStatusTransition` for a bounced cheque
    /// - `LedgerError::InsufficientAdvance` if its advance was already applied to bills
    pub fn cancel(
        &self,
        uow: &mut UnitOfWork<'_>,
        owner: OwnerId,
        id: PaymentOutId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PaymentOut, LedgerError> {
        let payment = uow.books().payment_out(owner, id)?.clone();
        let next = payment.status.transition(StatusEvent::Cancel)?;

        if payment.status.holds_allocations() {
            self.reverse_effects(uow, &payment, "Payment cancelled", now)?;
        }

        let reversal = match payment.ledger_entry {
            Some(entry) => {
                let note = reason.as_deref().unwrap_or("payment cancelled");
                Some(uow.void_entry(owner, entry, note, now)?.id)
            }
            None => None,
        };

        let record = uow.payment_out_mut(owner, id)?;
        record.status = next;
        record.reversal_entry = reversal;
        record.cancelled_at = Some(now);
        record.cancellation_reason = reason.clone();
        record.push_audit(
            PaymentOutAction::Cancelled,
            owner,
            format!(
                "Payment cancelled. Reason: {}",
                reason.as_deref().unwrap_or("No reason provided")
            ),
            now,
        );
        let cancelled = record.clone();

        info!(owner = %owner, payment_no = %cancelled.payment_no, "payment out cancelled");

        Ok(cancelled)
    }

    /// Settles part of a bill from the supplier's unused advance
    ///
    /// No money moves, so no ledger entry is written.
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` for an unknown supplier or bill
    /// - `LedgerError::Validation` if the amount is not positive
    /// - `LedgerError::AllocationExceedsBalance` if the bill owes less
    /// - `LedgerError::InsufficientAdvance` if the advance cannot cover it
    pub fn apply_supplier_advance(
        &self,
        uow: &mut UnitOfWork<'_>,
        owner: OwnerId,
        supplier: SupplierId,
        bill: BillId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Bill, LedgerError> {
        let books = uow.books();
        books.supplier(owner, supplier)?;
        if !amount.is_positive() {
            return Err(LedgerError::validation("advance amount must be greater than zero"));
        }
        let target = books.bill(owner, bill)?;
        if target.supplier != supplier || target.is_deleted {
            return Err(LedgerError::not_found("Bill", bill));
        }
        if amount > target.outstanding_amount {
            return Err(LedgerError::AllocationExceedsBalance {
                document: target.bill_no.clone(),
                balance: target.outstanding_amount.amount(),
                requested: amount.amount(),
            });
        }
        let bill_no = target.bill_no.clone();

        uow.advance_mut(owner, supplier).apply_advance(AdvanceApplication {
            bill,
            bill_no,
            amount,
            applied_at: now,
            applied_by: owner,
            payment_out: None,
        })?;

        let updated = uow.bill_mut(owner, bill)?;
        updated.apply_payment(amount, BillAction::AdvanceApplied, None, "Advance applied", now)?;
        let updated = updated.clone();

        uow.supplier_mut(owner, supplier)?.consume_advance(amount)?;

        info!(owner = %owner, bill_no = %updated.bill_no, amount = %amount, "supplier advance applied");

        Ok(updated)
    }

    /// Exact inverse of the bill, supplier and advance effects of `payment`
    fn reverse_effects(
        &self,
        uow: &mut UnitOfWork<'_>,
        payment: &PaymentOut,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let owner = payment.owner;
        if payment.advance_amount.is_positive() {
            uow.advance_mut(owner, payment.supplier)
                .withdraw_advance(payment.advance_amount)?;
        }

        for allocation in &payment.allocations {
            uow.bill_mut(owner, allocation.bill)?.reverse_payment(
                allocation.amount,
                Some(payment.id),
                format!("{} - {}", note, payment.payment_no),
                now,
            )?;
        }

        let supplier = uow.supplier_mut(owner, payment.supplier)?;
        supplier.adjust_outstanding(payment.total_allocated_to_bills)?;
        if payment.advance_amount.is_positive() {
            supplier.take_back_advance(payment.advance_amount)?;
        }
        Ok(())
    }
}
