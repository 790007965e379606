//! Append-only transaction ledger
//!
//! Every movement of money between two account references is recorded as a
//! [`LedgerEntry`]. Entries are never edited or removed: cancelling one
//! appends a compensating entry in the opposite direction and links the pair.
//! Both halves of a voided pair drop out of every balance and ledger view,
//! while [`TransactionLedger::audit_trail`] still shows them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use core_kernel::{LedgerEntryId, Money, OwnerId};

use crate::account_ref::AccountRef;
use crate::error::LedgerError;

/// Direction of an entry relative to the owner's liquid accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Money entering cash or a bank account from outside
    In,
    /// Money leaving cash or a bank account
    Out,
    /// Money moving between two liquid accounts
    Transfer,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::In => "in",
            EntryKind::Out => "out",
            EntryKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(EntryKind::In),
            "out" => Ok(EntryKind::Out),
            "transfer" => Ok(EntryKind::Transfer),
            other => Err(LedgerError::validation(format!("unknown entry kind '{}'", other))),
        }
    }
}

/// An entry waiting to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub owner: OwnerId,
    pub kind: EntryKind,
    pub amount: Money,
    pub from: AccountRef,
    pub to: AccountRef,
    /// Business date of the movement
    pub date: DateTime<Utc>,
    pub description: String,
    /// Cheque number, UTR or any other external reference
    pub reference: Option<String>,
}

impl NewEntry {
    /// Creates a new entry
    ///
    /// # Arguments
    ///
    /// * `owner` - Owner of the books
    /// * `kind` - Direction of the movement
    /// * `amount` - Amount moved, must be positive
    /// * `from` - Source account
    /// * `to` - Destination account, must differ from `from`
    /// * `date` - Business date of the movement
    pub fn new(
        owner: OwnerId,
        kind: EntryKind,
        amount: Money,
        from: AccountRef,
        to: AccountRef,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            owner,
            kind,
            amount,
            from,
            to,
            date,
            description: String::new(),
            reference: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference.filter(|r| !r.trim().is_empty());
        self
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if !self.amount.is_positive() {
            return Err(LedgerError::validation("entry amount must be positive"));
        }
        if self.from == self.to {
            return Err(LedgerError::validation(
                "source and destination accounts cannot be the same",
            ));
        }
        Ok(())
    }
}

/// A recorded money movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub owner: OwnerId,
    pub kind: EntryKind,
    pub amount: Money,
    pub from: AccountRef,
    pub to: AccountRef,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Insertion order, breaks ties between entries created in the same instant
    pub sequence: u64,
    pub description: String,
    pub reference: Option<String>,
    /// Matched against a bank statement
    pub reconciled: bool,
    pub reconciled_at: Option<DateTime<Utc>>,
    /// Set on an entry that has been cancelled
    pub voided_by: Option<LedgerEntryId>,
    /// Set on the compensating entry written by a cancellation
    pub reverses: Option<LedgerEntryId>,
}

impl LedgerEntry {
    /// Returns true if the entry counts towards balances
    pub fn is_active(&self) -> bool {
        self.voided_by.is_none() && self.reverses.is_none()
    }

    /// Returns true if either side of the entry is `account`
    pub fn touches(&self, account: &AccountRef) -> bool {
        &self.from == account || &self.to == account
    }

    /// Signed effect of this entry on `account`: positive when money arrives
    pub fn effect_on(&self, account: &AccountRef) -> Money {
        if &self.to == account {
            self.amount
        } else if &self.from == account {
            -self.amount
        } else {
            Money::ZERO
        }
    }

    /// Ordering used by every chronological view
    pub fn chronological_key(&self) -> (DateTime<Utc>, DateTime<Utc>, u64) {
        (self.date, self.created_at, self.sequence)
    }
}

/// The owner-partitioned, append-only log of entries
#[derive(Debug, Clone, Default)]
pub struct TransactionLedger {
    entries: Vec<LedgerEntry>,
    index: HashMap<LedgerEntryId, usize>,
    next_sequence: u64,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from persisted entries
    pub fn from_entries(mut entries: Vec<LedgerEntry>) -> Self {
        entries.sort_by_key(|e| e.sequence);
        let next_sequence = entries.last().map_or(0, |e| e.sequence + 1);
        let index = entries.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
        Self { entries, index, next_sequence }
    }

    /// Appends a new entry
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the amount is not positive or the
    /// two sides are the same account
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let entry = ledger.append(
    ///     NewEntry::new(owner, EntryKind::Transfer, amount, AccountRef::Cash, bank.into(), now),
    ///     now,
    /// )?;
    /// ```
    pub fn append(&mut self, new: NewEntry, now: DateTime<Utc>) -> Result<LedgerEntry, LedgerError> {
        new.validate()?;

        let entry = LedgerEntry {
            id: LedgerEntryId::new_v7(),
            owner: new.owner,
            kind: new.kind,
            amount: new.amount,
            from: new.from,
            to: new.to,
            date: new.date,
            created_at: now,
            sequence: self.next_sequence,
            description: new.description,
            reference: new.reference,
            reconciled: false,
            reconciled_at: None,
            voided_by: None,
            reverses: None,
        };

        self.push(entry.clone());
        Ok(entry)
    }

    /// Voids an active entry by appending its mirror image
    ///
    /// Returns the compensating entry. The original is marked with
    /// `voided_by` and the compensating one with `reverses`.
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` if the entry does not exist for this owner
    /// - `LedgerError::Validation` if the entry is already voided or is itself
    ///   a compensating entry
    pub fn void(
        &mut self,
        owner: OwnerId,
        id: LedgerEntryId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        let position = self.position_for(owner, id)?;
        let original = &self.entries[position];
        if !original.is_active() {
            return Err(LedgerError::validation(format!("entry {} is already voided", id)));
        }

        let compensating = LedgerEntry {
            id: LedgerEntryId::new_v7(),
            owner,
            kind: original.kind,
            amount: original.amount,
            from: original.to.clone(),
            to: original.from.clone(),
            date: now,
            created_at: now,
            sequence: self.next_sequence,
            description: format!("Void of {}: {}", id, reason),
            reference: original.reference.clone(),
            reconciled: false,
            reconciled_at: None,
            voided_by: None,
            reverses: Some(id),
        };

        self.entries[position].voided_by = Some(compensating.id);
        self.push(compensating.clone());
        Ok(compensating)
    }

    /// Sets the bank-statement flag on an active entry, returning the updated entry
    pub fn set_reconciled(
        &mut self,
        owner: OwnerId,
        id: LedgerEntryId,
        reconciled: bool,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        let position = self.position_for(owner, id)?;
        let entry = &mut self.entries[position];
        if !entry.is_active() {
            return Err(LedgerError::validation(format!("entry {} is voided", id)));
        }
        entry.reconciled = reconciled;
        entry.reconciled_at = if reconciled { Some(now) } else { None };
        Ok(entry.clone())
    }

    /// Gets an entry by id, if it belongs to `owner`
    pub fn get(&self, owner: OwnerId, id: LedgerEntryId) -> Option<&LedgerEntry> {
        self.index
            .get(&id)
            .map(|&i| &self.entries[i])
            .filter(|e| e.owner == owner)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every entry of every owner, in sequence order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active entries of one owner, in insertion order
    pub fn active(&self, owner: OwnerId) -> impl Iterator<Item = &LedgerEntry> {
        self.entries
            .iter()
            .filter(move |e| e.owner == owner && e.is_active())
    }

    /// Active entries of one owner that touch `account`
    pub fn touching<'a>(
        &'a self,
        owner: OwnerId,
        account: &'a AccountRef,
    ) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.active(owner).filter(move |e| e.touches(account))
    }

    /// Every entry of one owner, voided pairs included
    pub fn audit_trail(&self, owner: OwnerId) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(move |e| e.owner == owner)
    }

    /// Net movement on an account over all active entries
    pub fn net_movement(&self, owner: OwnerId, account: &AccountRef) -> Result<Money, LedgerError> {
        let mut total = Money::ZERO;
        for entry in self.touching(owner, account) {
            total = total.checked_add(&entry.effect_on(account))?;
        }
        Ok(total)
    }

    /// Cash in hand, recomputed from the log every time
    pub fn cash_balance(&self, owner: OwnerId) -> Result<Money, LedgerError> {
        self.net_movement(owner, &AccountRef::Cash)
    }

    /// Owners with at least one entry
    pub fn owners(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.entries.iter().map(|e| e.owner)
    }

    /// Returns true if any entry, voided or not, references the account
    pub fn references(&self, account: &AccountRef) -> bool {
        self.entries.iter().any(|e| e.touches(account))
    }

    /// Removes every entry appended after the log had `len` entries
    pub(crate) fn truncate(&mut self, len: usize) {
        for removed in self.entries.drain(len.min(self.entries.len())..) {
            self.index.remove(&removed.id);
        }
        self.next_sequence = self.entries.last().map_or(0, |e| e.sequence + 1);
    }

    /// Puts back a previous version of an existing entry
    pub(crate) fn restore(&mut self, entry: LedgerEntry) {
        if let Some(&position) = self.index.get(&entry.id) {
            self.entries[position] = entry;
        }
    }

    fn push(&mut self, entry: LedgerEntry) {
        self.next_sequence = entry.sequence + 1;
        self.index.insert(entry.id, self.entries.len());
        self.entries.push(entry);
    }

    fn position_for(&self, owner: OwnerId, id: LedgerEntryId) -> Result<usize, LedgerError> {
        self.index
            .get(&id)
            .copied()
            .filter(|&i| self.entries[i].owner == owner)
            .ok_or_else(|| LedgerError::not_found("Ledger entry", id))
    }
}
