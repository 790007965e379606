//! Customers and suppliers
//!
//! Only the balance fields the ledger depends on are modelled. Each numeric
//! field has exactly one writer method, so every change to a customer's dues
//! or a supplier's outstanding and advance mirrors goes through here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, Money, OwnerId, SupplierId};

use crate::error::LedgerError;

/// A customer and their running receivable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub owner: OwnerId,
    pub name: String,
    pub phone: Option<String>,
    /// Positive when the customer owes, negative when they hold credit
    dues: Money,
    /// Dues carried in from before the ledger, not backed by any invoice
    #[serde(default)]
    opening_dues: Money,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(owner: OwnerId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: CustomerId::new_v7(),
            owner,
            name: name.into(),
            phone: None,
            dues: Money::ZERO,
            opening_dues: Money::ZERO,
            version: 0,
            created_at,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Sets the dues carried over from before the ledger existed
    pub fn with_opening_dues(mut self, dues: Money) -> Self {
        self.dues = dues;
        self.opening_dues = dues;
        self
    }

    /// Sets both figures when loading a persisted customer
    pub fn with_stored_dues(mut self, opening_dues: Money, dues: Money) -> Self {
        self.opening_dues = opening_dues;
        self.dues = dues;
        self
    }

    pub fn dues(&self) -> Money {
        self.dues
    }

    pub fn opening_dues(&self) -> Money {
        self.opening_dues
    }

    /// Credit the customer can spend against new invoices
    pub fn available_credit(&self) -> Money {
        (-self.dues).clamp_non_negative()
    }

    /// Amount the customer owes, zero when in credit
    pub fn outstanding_due(&self) -> Money {
        self.dues.clamp_non_negative()
    }

    pub(crate) fn adjust_dues(&mut self, delta: Money) -> Result<(), LedgerError> {
        self.dues = self.dues.checked_add(&delta)?;
        self.version += 1;
        Ok(())
    }

    /// Treats whatever the customer owes at registration as opening dues
    pub(crate) fn mark_opening_balance(&mut self) {
        self.opening_dues = self.dues;
    }
}

/// A supplier with its payable and advance mirrors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub owner: OwnerId,
    pub business_name: String,
    pub contact_person: Option<String>,
    /// Opening payable plus the outstanding amounts of the supplier's live bills
    outstanding_balance: Money,
    /// Payable carried in from before the ledger, not backed by any bill
    #[serde(default)]
    opening_outstanding: Money,
    /// Advance given and not yet applied to bills
    advance_balance: Money,
    /// Lifetime advance given
    total_advance_given: Money,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Supplier {
    pub fn new(owner: OwnerId, business_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: SupplierId::new_v7(),
            owner,
            business_name: business_name.into(),
            contact_person: None,
            outstanding_balance: Money::ZERO,
            opening_outstanding: Money::ZERO,
            advance_balance: Money::ZERO,
            total_advance_given: Money::ZERO,
            version: 0,
            created_at,
        }
    }

    pub fn with_contact(mut self, contact_person: impl Into<String>) -> Self {
        self.contact_person = Some(contact_person.into());
        self
    }

    /// Sets the payable carried over from before the ledger existed
    pub fn with_opening_outstanding(mut self, outstanding: Money) -> Self {
        self.outstanding_balance = outstanding;
        self.opening_outstanding = outstanding;
        self
    }

    /// Sets the mirrors when loading a persisted supplier
    pub fn with_balances(mut self, outstanding: Money, advance: Money, total_advance_given: Money) -> Self {
        self.outstanding_balance = outstanding;
        self.advance_balance = advance;
        self.total_advance_given = total_advance_given;
        self
    }

    pub fn outstanding_balance(&self) -> Money {
        self.outstanding_balance
    }

    pub fn opening_outstanding(&self) -> Money {
        self.opening_outstanding
    }

    pub fn advance_balance(&self) -> Money {
        self.advance_balance
    }

    pub fn total_advance_given(&self) -> Money {
        self.total_advance_given
    }

    /// Changes the payable by `delta` (negative when bills are paid)
    pub(crate) fn adjust_outstanding(&mut self, delta: Money) -> Result<(), LedgerError> {
        self.outstanding_balance = self.outstanding_balance.checked_add(&delta)?;
        self.version += 1;
        Ok(())
    }

    /// Records a fresh advance
    pub(crate) fn give_advance(&mut self, amount: Money) -> Result<(), LedgerError> {
        self.advance_balance = self.advance_balance.checked_add(&amount)?;
        self.total_advance_given = self.total_advance_given.checked_add(&amount)?;
        self.version += 1;
        Ok(())
    }

    /// Inverse of [`Self::give_advance`]
    pub(crate) fn take_back_advance(&mut self, amount: Money) -> Result<(), LedgerError> {
        self.advance_balance = self.advance_balance.checked_sub(&amount)?;
        self.total_advance_given = self.total_advance_given.checked_sub(&amount)?;
        self.version += 1;
        Ok(())
    }

    /// Treats the payable at registration as the opening balance
    pub(crate) fn mark_opening_balance(&mut self) {
        self.opening_outstanding = self.outstanding_balance;
    }

    /// Moves advance onto a bill: both the advance and the payable shrink
    pub(crate) fn consume_advance(&mut self, amount: Money) -> Result<(), LedgerError> {
        self.advance_balance = self.advance_balance.checked_sub(&amount)?;
        self.outstanding_balance = self.outstanding_balance.checked_sub(&amount)?;
        self.version += 1;
        Ok(())
    }
}
