//! Supplier advance ledger
//!
//! One record per supplier tracks how much advance was given and how much has
//! been applied to bills. `remaining` is recomputed from the two totals after
//! every mutation and can never go below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{BillId, Money, OwnerId, PaymentOutId, SupplierId};

use crate::error::LedgerError;

/// One use of advance against a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceApplication {
    pub bill: BillId,
    pub bill_no: String,
    pub amount: Money,
    pub applied_at: DateTime<Utc>,
    pub applied_by: OwnerId,
    pub payment_out: Option<PaymentOutId>,
}

/// Advance position of a single supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierAdvance {
    pub supplier: SupplierId,
    pub owner: OwnerId,
    total_given: Money,
    total_used: Money,
    remaining: Money,
    pub applications: Vec<AdvanceApplication>,
    pub version: u64,
}

impl SupplierAdvance {
    /// A record with nothing given and nothing used
    pub fn zeroed(owner: OwnerId, supplier: SupplierId) -> Self {
        Self {
            supplier,
            owner,
            total_given: Money::ZERO,
            total_used: Money::ZERO,
            remaining: Money::ZERO,
            applications: Vec::new(),
            version: 0,
        }
    }

    /// Rebuilds a persisted record, recomputing `remaining`
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if more was used than given
    pub fn from_totals(owner: OwnerId, supplier: SupplierId, given: Money, used: Money) -> Result<Self, LedgerError> {
        if used > given {
            return Err(LedgerError::validation(format!(
                "advance used {} exceeds advance given {}",
                used, given
            )));
        }
        let mut record = Self::zeroed(owner, supplier);
        record.total_given = given;
        record.total_used = used;
        record.recompute()?;
        Ok(record)
    }

    pub fn total_given(&self) -> Money {
        self.total_given
    }

    pub fn total_used(&self) -> Money {
        self.total_used
    }

    pub fn remaining(&self) -> Money {
        self.remaining
    }

    /// Records new advance given to the supplier
    pub fn add_advance(&mut self, amount: Money) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::validation("advance amount must be positive"));
        }
        self.total_given = self.total_given.checked_add(&amount)?;
        self.recompute()
    }

    /// Takes back advance that was given but never used
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientAdvance` if part of the amount has
    /// already been applied to bills
    pub fn withdraw_advance(&mut self, amount: Money) -> Result<(), LedgerError> {
        self.ensure_remaining(amount)?;
        self.total_given = self.total_given.checked_sub(&amount)?;
        self.recompute()
    }

    /// Uses advance to settle part of a bill
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientAdvance` if `amount` exceeds what is left
    pub fn apply_advance(&mut self, application: AdvanceApplication) -> Result<(), LedgerError> {
        if !application.amount.is_positive() {
            return Err(LedgerError::validation("applied advance must be positive"));
        }
        self.ensure_remaining(application.amount)?;
        self.total_used = self.total_used.checked_add(&application.amount)?;
        self.applications.push(application);
        self.recompute()
    }

    fn ensure_remaining(&self, amount: Money) -> Result<(), LedgerError> {
        if amount > self.remaining {
            return Err(LedgerError::InsufficientAdvance {
                supplier: self.supplier.to_string(),
                remaining: self.remaining.amount(),
                requested: amount.amount(),
            });
        }
        Ok(())
    }

    fn recompute(&mut self) -> Result<(), LedgerError> {
        self.remaining = self.total_given.checked_sub(&self.total_used)?;
        self.version += 1;
        Ok(())
    }
}

/// Advance records keyed by owner and supplier
#[derive(Debug, Clone, Default)]
pub struct AdvanceLedger {
    records: HashMap<(OwnerId, SupplierId), SupplierAdvance>,
}

impl AdvanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: OwnerId, supplier: SupplierId) -> Option<&SupplierAdvance> {
        self.records.get(&(owner, supplier))
    }

    /// Returns the supplier's record, creating a zeroed one if none exists
    pub fn get_or_create(&mut self, owner: OwnerId, supplier: SupplierId) -> &mut SupplierAdvance {
        self.records
            .entry((owner, supplier))
            .or_insert_with(|| SupplierAdvance::zeroed(owner, supplier))
    }

    /// Records of one owner
    pub fn records_for(&self, owner: OwnerId) -> impl Iterator<Item = &SupplierAdvance> {
        self.records.values().filter(move |r| r.owner == owner)
    }

    pub fn insert(&mut self, record: SupplierAdvance) {
        self.records.insert((record.owner, record.supplier), record);
    }

    pub(crate) fn restore(&mut self, key: (OwnerId, SupplierId), prior: Option<SupplierAdvance>) {
        match prior {
            Some(record) => {
                self.records.insert(key, record);
            }
            None => {
                self.records.remove(&key);
            }
        }
    }
}
