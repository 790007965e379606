//! In-memory books
//!
//! `Books` holds every table the engine reads and writes. It is only mutated
//! through a [`UnitOfWork`](crate::unit_of_work::UnitOfWork) so any failed
//! call can be undone.

use std::collections::HashMap;

use core_kernel::{
    BillId, CustomerId, InvoiceId, Money, OwnerId, PaymentInId, PaymentOutId, SupplierId,
};

use crate::account_ref::AccountRef;
use crate::activity::ActivityEntry;
use crate::advance::AdvanceLedger;
use crate::balance::AccountBalanceCache;
use crate::bill::Bill;
use crate::error::LedgerError;
use crate::invoice::Invoice;
use crate::ledger::TransactionLedger;
use crate::numbering::DocumentSequences;
use crate::parties::{Customer, Supplier};
use crate::payment_in::PaymentIn;
use crate::payment_out::PaymentOut;

/// Everything the engine knows, for every owner
#[derive(Debug, Clone, Default)]
pub struct Books {
    pub ledger: TransactionLedger,
    pub bank_accounts: AccountBalanceCache,
    pub customers: HashMap<CustomerId, Customer>,
    pub suppliers: HashMap<SupplierId, Supplier>,
    pub invoices: HashMap<InvoiceId, Invoice>,
    pub bills: HashMap<BillId, Bill>,
    pub advances: AdvanceLedger,
    pub payments_in: HashMap<PaymentInId, PaymentIn>,
    pub payments_out: HashMap<PaymentOutId, PaymentOut>,
    pub activity: Vec<ActivityEntry>,
    pub sequences: DocumentSequences,
}

impl Books {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer(&self, owner: OwnerId, id: CustomerId) -> Result<&Customer, LedgerError> {
        self.customers
            .get(&id)
            .filter(|c| c.owner == owner)
            .ok_or_else(|| LedgerError::not_found("Customer", id))
    }

    pub fn supplier(&self, owner: OwnerId, id: SupplierId) -> Result<&Supplier, LedgerError> {
        self.suppliers
            .get(&id)
            .filter(|s| s.owner == owner)
            .ok_or_else(|| LedgerError::not_found("Supplier", id))
    }

    pub fn invoice(&self, owner: OwnerId, id: InvoiceId) -> Result<&Invoice, LedgerError> {
        self.invoices
            .get(&id)
            .filter(|i| i.owner == owner)
            .ok_or_else(|| LedgerError::not_found("Invoice", id))
    }

    pub fn bill(&self, owner: OwnerId, id: BillId) -> Result<&Bill, LedgerError> {
        self.bills
            .get(&id)
            .filter(|b| b.owner == owner)
            .ok_or_else(|| LedgerError::not_found("Bill", id))
    }

    pub fn payment_in(&self, owner: OwnerId, id: PaymentInId) -> Result<&PaymentIn, LedgerError> {
        self.payments_in
            .get(&id)
            .filter(|p| p.owner == owner)
            .ok_or_else(|| LedgerError::not_found("Payment in", id))
    }

    pub fn payment_out(&self, owner: OwnerId, id: PaymentOutId) -> Result<&PaymentOut, LedgerError> {
        self.payments_out
            .get(&id)
            .filter(|p| p.owner == owner)
            .ok_or_else(|| LedgerError::not_found("Payment out", id))
    }

    /// Checks that `account` is cash or a bank account owned by `owner`
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` for external categories and inactive accounts
    /// - `LedgerError::NotFound` for unknown or foreign bank accounts
    pub fn require_liquid(&self, owner: OwnerId, account: &AccountRef) -> Result<(), LedgerError> {
        match account {
            AccountRef::Cash => Ok(()),
            AccountRef::Bank(id) => self.bank_accounts.get_active(owner, *id).map(|_| ()),
            AccountRef::External(category) => Err(LedgerError::validation(format!(
                "'{}' is not a cash or bank account",
                category
            ))),
        }
    }

    /// Balance available to spend from a liquid account
    pub fn available_balance(&self, owner: OwnerId, account: &AccountRef) -> Result<Money, LedgerError> {
        match account {
            AccountRef::Cash => self.ledger.cash_balance(owner),
            AccountRef::Bank(id) => Ok(self.bank_accounts.get(owner, *id)?.current_balance()),
            AccountRef::External(category) => Err(LedgerError::validation(format!(
                "'{}' does not hold a balance",
                category
            ))),
        }
    }

    /// Fails with a structured `InsufficientFunds` error when `account`
    /// cannot cover `amount`
    pub fn ensure_sufficient(
        &self,
        owner: OwnerId,
        account: &AccountRef,
        amount: Money,
    ) -> Result<(), LedgerError> {
        let available = self.available_balance(owner, account)?;
        if available < amount {
            return Err(LedgerError::insufficient_funds(
                account.clone(),
                available.amount(),
                amount.amount(),
            ));
        }
        Ok(())
    }
}
