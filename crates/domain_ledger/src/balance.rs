//! Bank accounts and their cached balances
//!
//! A bank account's `current_balance` is a materialized fold over the ledger.
//! [`AccountBalanceCache`] is the only code that writes it, always in the same
//! unit of work as the ledger write that justifies the change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{BankAccountId, Money, OwnerId};

use crate::account_ref::AccountRef;
use crate::error::LedgerError;
use crate::ledger::{LedgerEntry, TransactionLedger};

/// Kind of bank account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankAccountType {
    #[default]
    Savings,
    Current,
    Overdraft,
    Loan,
}

impl BankAccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankAccountType::Savings => "savings",
            BankAccountType::Current => "current",
            BankAccountType::Overdraft => "overdraft",
            BankAccountType::Loan => "loan",
        }
    }

    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        match value.to_ascii_lowercase().as_str() {
            "savings" => Ok(BankAccountType::Savings),
            "current" => Ok(BankAccountType::Current),
            "overdraft" => Ok(BankAccountType::Overdraft),
            "loan" => Ok(BankAccountType::Loan),
            other => Err(LedgerError::validation(format!("unknown bank account type '{}'", other))),
        }
    }
}

/// Whether the account may still be used for new movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankAccountStatus {
    #[default]
    Active,
    Inactive,
}

/// An owned bank account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub owner: OwnerId,
    pub bank_name: String,
    pub account_number: String,
    pub account_type: BankAccountType,
    pub branch: Option<String>,
    pub ifsc: Option<String>,
    pub opening_balance: Money,
    current_balance: Money,
    pub status: BankAccountStatus,
    /// Bumped on every balance change
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl BankAccount {
    /// Creates a new account whose balance starts at the opening balance
    ///
    /// # Arguments
    ///
    /// * `owner` - Owner of the account
    /// * `bank_name` - Name of the bank
    /// * `account_number` - Account number as printed on statements
    /// * `opening_balance` - Balance before the first ledger entry
    pub fn new(
        owner: OwnerId,
        bank_name: impl Into<String>,
        account_number: impl Into<String>,
        opening_balance: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BankAccountId::new_v7(),
            owner,
            bank_name: bank_name.into(),
            account_number: account_number.into(),
            account_type: BankAccountType::default(),
            branch: None,
            ifsc: None,
            opening_balance,
            current_balance: opening_balance,
            status: BankAccountStatus::Active,
            version: 0,
            created_at,
        }
    }

    pub fn with_type(mut self, account_type: BankAccountType) -> Self {
        self.account_type = account_type;
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>, ifsc: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self.ifsc = Some(ifsc.into());
        self
    }

    /// Sets the cached balance when loading a persisted account
    pub fn with_current_balance(mut self, current_balance: Money) -> Self {
        self.current_balance = current_balance;
        self
    }

    pub fn current_balance(&self) -> Money {
        self.current_balance
    }

    /// Account number with all but the last four characters hidden
    pub fn masked_number(&self) -> String {
        let chars: Vec<char> = self.account_number.chars().collect();
        let visible = chars.len().saturating_sub(4);
        chars
            .iter()
            .enumerate()
            .map(|(i, c)| if i < visible { '*' } else { *c })
            .collect()
    }

    pub fn account_ref(&self) -> AccountRef {
        AccountRef::Bank(self.id)
    }
}

/// Materialized balances of every bank account
#[derive(Debug, Clone, Default)]
pub struct AccountBalanceCache {
    accounts: HashMap<BankAccountId, BankAccount>,
}

impl AccountBalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the id is taken or the owner already
    /// has an account with the same bank and number
    pub fn open(&mut self, account: BankAccount) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&account.id) {
            return Err(LedgerError::validation(format!("bank account {} already exists", account.id)));
        }
        let duplicate = self.accounts.values().any(|a| {
            a.owner == account.owner
                && a.bank_name.eq_ignore_ascii_case(&account.bank_name)
                && a.account_number == account.account_number
        });
        if duplicate {
            return Err(LedgerError::validation("account already exists"));
        }
        self.accounts.insert(account.id, account);
        Ok(())
    }

    /// Gets an account owned by `owner`
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` when the account is missing or belongs
    /// to another owner
    pub fn get(&self, owner: OwnerId, id: BankAccountId) -> Result<&BankAccount, LedgerError> {
        self.accounts
            .get(&id)
            .filter(|a| a.owner == owner)
            .ok_or_else(|| LedgerError::not_found("Bank account", id))
    }

    /// Gets an account that may take new movements
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` as for [`Self::get`]
    /// - `LedgerError::Validation` when the account is inactive
    pub fn get_active(&self, owner: OwnerId, id: BankAccountId) -> Result<&BankAccount, LedgerError> {
        let account = self.get(owner, id)?;
        if account.status != BankAccountStatus::Active {
            return Err(LedgerError::validation(format!(
                "bank account {} {} is inactive",
                account.bank_name,
                account.masked_number()
            )));
        }
        Ok(account)
    }

    /// Looks an account up regardless of owner
    pub fn find(&self, id: BankAccountId) -> Option<&BankAccount> {
        self.accounts.get(&id)
    }

    /// Accounts of one owner, oldest first
    pub fn accounts_for(&self, owner: OwnerId) -> Vec<&BankAccount> {
        let mut accounts: Vec<&BankAccount> = self
            .accounts
            .values()
            .filter(|a| a.owner == owner)
            .collect();
        accounts.sort_by_key(|a| (a.created_at, a.id));
        accounts
    }

    pub fn owners(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.accounts.values().map(|a| a.owner)
    }

    /// Sum of current balances across an owner's active accounts
    pub fn total_for(&self, owner: OwnerId) -> Result<Money, LedgerError> {
        let balances: Vec<Money> = self
            .accounts_for(owner)
            .into_iter()
            .filter(|a| a.status == BankAccountStatus::Active)
            .map(|a| a.current_balance)
            .collect();
        Ok(Money::checked_sum(&balances)?)
    }

    /// Adds `amount` to the cached balance
    pub fn credit(&mut self, id: BankAccountId, amount: Money) -> Result<Money, LedgerError> {
        self.adjust(id, amount)
    }

    /// Subtracts `amount` from the cached balance
    pub fn debit(&mut self, id: BankAccountId, amount: Money) -> Result<Money, LedgerError> {
        self.adjust(id, -amount)
    }

    /// Applies an entry's effect to every bank side it touches
    pub fn apply_entry(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if let Some(id) = entry.to.bank_id() {
            self.credit(id, entry.amount)?;
        }
        if let Some(id) = entry.from.bank_id() {
            self.debit(id, entry.amount)?;
        }
        Ok(())
    }

    /// Removes an entry's effect, the inverse of [`Self::apply_entry`]
    pub fn revert_entry(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if let Some(id) = entry.to.bank_id() {
            self.debit(id, entry.amount)?;
        }
        if let Some(id) = entry.from.bank_id() {
            self.credit(id, entry.amount)?;
        }
        Ok(())
    }

    /// Recomputes what the cached balance should be from the ledger
    pub fn expected_balance(
        &self,
        id: BankAccountId,
        ledger: &TransactionLedger,
    ) -> Result<Money, LedgerError> {
        let account = self
            .accounts
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("Bank account", id))?;
        let movement = ledger.net_movement(account.owner, &AccountRef::Bank(id))?;
        Ok(account.opening_balance.checked_add(&movement)?)
    }

    pub(crate) fn get_mut(&mut self, id: BankAccountId) -> Option<&mut BankAccount> {
        self.accounts.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: BankAccountId) -> Option<BankAccount> {
        self.accounts.remove(&id)
    }

    /// Puts an account back to a prior state, or removes it if it did not exist
    pub(crate) fn restore(&mut self, id: BankAccountId, prior: Option<BankAccount>) {
        match prior {
            Some(account) => {
                self.accounts.insert(id, account);
            }
            None => {
                self.accounts.remove(&id);
            }
        }
    }

    fn adjust(&mut self, id: BankAccountId, delta: Money) -> Result<Money, LedgerError> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("Bank account", id))?;
        account.current_balance = account.current_balance.checked_add(&delta)?;
        account.version += 1;
        Ok(account.current_balance)
    }
}
