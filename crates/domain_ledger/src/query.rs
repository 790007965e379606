//! Account statements with running balances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{DateRange, Money, OwnerId, Timezone};

use crate::account_ref::AccountRef;
use crate::error::LedgerError;
use crate::ledger::LedgerEntry;
use crate::store::Books;

/// Which side of the account a row hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowDirection {
    /// Money came into the account
    Credit,
    /// Money left the account
    Debit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub entry: LedgerEntry,
    pub debit: Money,
    pub credit: Money,
    pub running_balance: Money,
    pub direction: RowDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Balance at the start of the period
    pub opening_balance: Money,
    pub total_credits: Money,
    pub total_debits: Money,
    pub closing_balance: Money,
}

/// Statement of one account over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLedger {
    pub account: AccountRef,
    /// Balance the account was opened with, zero for cash
    pub account_opening_balance: Money,
    pub rows: Vec<LedgerRow>,
    pub summary: LedgerSummary,
}

/// Read-only view over the books for statements
pub struct LedgerQuery<'a> {
    books: &'a Books,
    timezone: &'a Timezone,
}

impl<'a> LedgerQuery<'a> {
    pub fn new(books: &'a Books, timezone: &'a Timezone) -> Self {
        Self { books, timezone }
    }

    /// Builds the statement of `account` for `range`
    ///
    /// Dates are business calendar days, both ends included. Entries before
    /// the range are replayed into the period opening balance. The optional
    /// `reconciled` filter narrows the rows but never the opening balance.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` for an external category
    /// - `LedgerError::NotFound` for an unknown bank account
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let march = DateRange::between(first, last)?;
    /// let statement = LedgerQuery::new(&books, &tz).account_ledger(owner, &AccountRef::Cash, march, None)?;
    /// assert_eq!(statement.summary.closing_balance, books.ledger.cash_balance(owner)?);
    /// ```
    pub fn account_ledger(
        &self,
        owner: OwnerId,
        account: &AccountRef,
        range: DateRange,
        reconciled: Option<bool>,
    ) -> Result<AccountLedger, LedgerError> {
        let declared_opening = self.declared_opening(owner, account)?;
        let bounds = range.to_utc_bounds(self.timezone)?;

        let mut opening_balance = declared_opening;
        let mut in_range: Vec<&LedgerEntry> = Vec::new();
        for entry in self.books.ledger.touching(owner, account) {
            if bounds.is_before(entry.date) {
                opening_balance = opening_balance.checked_add(&entry.effect_on(account))?;
            } else if bounds.contains(entry.date)
                && reconciled.map_or(true, |flag| entry.reconciled == flag)
            {
                in_range.push(entry);
            }
        }
        in_range.sort_by_key(|e| e.chronological_key());

        let mut running_balance = opening_balance;
        let mut total_credits = Money::ZERO;
        let mut total_debits = Money::ZERO;
        let mut rows = Vec::with_capacity(in_range.len());
        for entry in in_range {
            let (direction, credit, debit) = if &entry.to == account {
                (RowDirection::Credit, entry.amount, Money::ZERO)
            } else {
                (RowDirection::Debit, Money::ZERO, entry.amount)
            };
            total_credits = total_credits.checked_add(&credit)?;
            total_debits = total_debits.checked_add(&debit)?;
            running_balance = running_balance.checked_add(&credit)?.checked_sub(&debit)?;
            rows.push(LedgerRow {
                entry: entry.clone(),
                debit,
                credit,
                running_balance,
                direction,
            });
        }

        Ok(AccountLedger {
            account: account.clone(),
            account_opening_balance: declared_opening,
            rows,
            summary: LedgerSummary {
                opening_balance,
                total_credits,
                total_debits,
                closing_balance: running_balance,
            },
        })
    }

    /// Active entries touching `account`, newest first
    pub fn transactions(&self, owner: OwnerId, account: &AccountRef) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.declared_opening(owner, account)?;
        let mut entries: Vec<LedgerEntry> = self.books.ledger.touching(owner, account).cloned().collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.chronological_key()));
        Ok(entries)
    }

    /// Active entries of any account dated inside `range`, oldest first
    pub fn entries_between(&self, owner: OwnerId, range: DateRange) -> Result<Vec<LedgerEntry>, LedgerError> {
        let bounds = range.to_utc_bounds(self.timezone)?;
        let mut entries: Vec<LedgerEntry> = self
            .books
            .ledger
            .active(owner)
            .filter(|e| bounds.contains(e.date))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.chronological_key());
        Ok(entries)
    }

    /// Balance of a liquid account as of the end of `at`'s business day
    pub fn balance_as_of(&self, owner: OwnerId, account: &AccountRef, at: DateTime<Utc>) -> Result<Money, LedgerError> {
        let range = DateRange::until(self.timezone.local_date(at));
        Ok(self.account_ledger(owner, account, range, None)?.summary.closing_balance)
    }

    fn declared_opening(&self, owner: OwnerId, account: &AccountRef) -> Result<Money, LedgerError> {
        match account {
            AccountRef::Cash => Ok(Money::ZERO),
            AccountRef::Bank(id) => Ok(self.books.bank_accounts.get(owner, *id)?.opening_balance),
            AccountRef::External(category) => Err(LedgerError::validation(format!(
                "no ledger is kept for external category '{}'",
                category
            ))),
        }
    }
}
