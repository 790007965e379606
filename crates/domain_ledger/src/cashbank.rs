//! Cash and bank operations
//!
//! Transfers between liquid accounts, cash receipts and spends, the
//! liquidity position, and bank-statement reconciliation flags.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use core_kernel::{LedgerEntryId, Money, OwnerId};

use crate::account_ref::AccountRef;
use crate::balance::{BankAccount, BankAccountStatus};
use crate::error::LedgerError;
use crate::ledger::{EntryKind, LedgerEntry, NewEntry};
use crate::store::Books;
use crate::unit_of_work::UnitOfWork;

/// Move between two liquid accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: AccountRef,
    pub to: AccountRef,
    pub amount: Money,
    pub description: Option<String>,
    pub reference: Option<String>,
    /// Defaults to the time of recording
    pub date: Option<DateTime<Utc>>,
}

impl TransferRequest {
    pub fn new(from: AccountRef, to: AccountRef, amount: Money) -> Self {
        Self { from, to, amount, description: None, reference: None, date: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Which way money moves relative to cash in hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashDirection {
    In,
    Out,
}

/// Cash received from, or paid to, another account or category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashTransactionRequest {
    pub direction: CashDirection,
    pub other: AccountRef,
    pub amount: Money,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl CashTransactionRequest {
    pub fn new(direction: CashDirection, other: AccountRef, amount: Money) -> Self {
        Self { direction, other, amount, description: None, reference: None, date: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn on_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}

/// Share of total liquidity held in one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityShare {
    pub amount: Money,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankShare {
    pub amount: Money,
    pub percentage: Decimal,
    pub accounts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionBreakdown {
    pub cash: LiquidityShare,
    pub bank: BankShare,
}

/// Cash against bank split of an owner's money
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashBankPosition {
    pub cash_in_hand: Money,
    pub total_bank_balance: Money,
    pub total_liquidity: Money,
    pub breakdown: PositionBreakdown,
}

/// Every bank account of an owner with the combined balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSummary {
    /// Sorted by bank name
    pub accounts: Vec<BankAccount>,
    /// Sum over active accounts
    pub total_balance: Money,
    pub account_count: usize,
}

/// Moves money between cash and owned bank accounts
///
/// # Errors
///
/// - `LedgerError::Validation` if the sides match, the amount is not positive,
///   either side is not cash or a bank account, or a bank side is inactive
/// - `LedgerError::NotFound` for an unknown bank account
/// - `LedgerError::InsufficientFunds` if the source cannot cover the amount
pub fn transfer(
    uow: &mut UnitOfWork<'_>,
    owner: OwnerId,
    request: TransferRequest,
    now: DateTime<Utc>,
) -> Result<LedgerEntry, LedgerError> {
    if request.from == request.to {
        return Err(LedgerError::validation("cannot transfer to the same account"));
    }
    if !request.amount.is_positive() {
        return Err(LedgerError::validation("transfer amount must be positive"));
    }
    let books = uow.books();
    books.require_liquid(owner, &request.from)?;
    books.require_liquid(owner, &request.to)?;
    books.ensure_sufficient(owner, &request.from, request.amount)?;

    let entry = uow.post_entry(
        NewEntry::new(
            owner,
            EntryKind::Transfer,
            request.amount,
            request.from,
            request.to,
            request.date.unwrap_or(now),
        )
        .with_description(request.description.unwrap_or_default())
        .with_reference(request.reference),
        now,
    )?;

    info!(
        owner = %owner,
        from = %entry.from,
        to = %entry.to,
        amount = %entry.amount,
        "transfer recorded"
    );
    Ok(entry)
}

/// Records cash received or paid
///
/// When the other side is a bank account this is a transfer and the source
/// side must cover the amount. Otherwise it is an `in` or `out` entry against
/// a category, and paying cash out still requires enough cash in hand.
///
/// # Errors
///
/// - `LedgerError::Validation` if the amount is not positive or the other side is cash
/// - `LedgerError::NotFound` for an unknown bank account
/// - `LedgerError::InsufficientFunds` if the source cannot cover the amount
pub fn cash_transaction(
    uow: &mut UnitOfWork<'_>,
    owner: OwnerId,
    request: CashTransactionRequest,
    now: DateTime<Utc>,
) -> Result<LedgerEntry, LedgerError> {
    if !request.amount.is_positive() {
        return Err(LedgerError::validation("amount must be positive"));
    }

    let (from, to) = match request.direction {
        CashDirection::In => (request.other.clone(), AccountRef::Cash),
        CashDirection::Out => (AccountRef::Cash, request.other.clone()),
    };

    let books = uow.books();
    let kind = match &request.other {
        AccountRef::Cash => {
            return Err(LedgerError::validation("the other side of a cash transaction cannot be cash"))
        }
        AccountRef::Bank(id) => {
            books.bank_accounts.get_active(owner, *id)?;
            books.ensure_sufficient(owner, &from, request.amount)?;
            EntryKind::Transfer
        }
        AccountRef::External(_) => match request.direction {
            CashDirection::In => EntryKind::In,
            CashDirection::Out => {
                books.ensure_sufficient(owner, &AccountRef::Cash, request.amount)?;
                EntryKind::Out
            }
        },
    };

    let entry = uow.post_entry(
        NewEntry::new(owner, kind, request.amount, from, to, request.date.unwrap_or(now))
            .with_description(request.description.unwrap_or_default())
            .with_reference(request.reference),
        now,
    )?;

    info!(
        owner = %owner,
        kind = %entry.kind,
        other = %request.other,
        amount = %entry.amount,
        "cash transaction recorded"
    );
    Ok(entry)
}

/// Splits an owner's liquidity between cash in hand and active bank accounts
pub fn position(books: &Books, owner: OwnerId) -> Result<CashBankPosition, LedgerError> {
    let cash_in_hand = books.ledger.cash_balance(owner)?;
    let total_bank_balance = books.bank_accounts.total_for(owner)?;
    let total_liquidity = cash_in_hand.checked_add(&total_bank_balance)?;
    let accounts = books
        .bank_accounts
        .accounts_for(owner)
        .into_iter()
        .filter(|a| a.status == BankAccountStatus::Active)
        .count();

    Ok(CashBankPosition {
        cash_in_hand,
        total_bank_balance,
        total_liquidity,
        breakdown: PositionBreakdown {
            cash: LiquidityShare {
                amount: cash_in_hand,
                percentage: cash_in_hand.percentage_of(total_liquidity),
            },
            bank: BankShare {
                amount: total_bank_balance,
                percentage: total_bank_balance.percentage_of(total_liquidity),
                accounts,
            },
        },
    })
}

pub fn bank_summary(books: &Books, owner: OwnerId) -> Result<BankSummary, LedgerError> {
    let mut accounts: Vec<BankAccount> = books
        .bank_accounts
        .accounts_for(owner)
        .into_iter()
        .cloned()
        .collect();
    accounts.sort_by(|a, b| a.bank_name.cmp(&b.bank_name));

    Ok(BankSummary {
        total_balance: books.bank_accounts.total_for(owner)?,
        account_count: accounts.len(),
        accounts,
    })
}

/// Flips the reconciled flag of one entry
pub fn toggle_reconciliation(
    uow: &mut UnitOfWork<'_>,
    owner: OwnerId,
    id: LedgerEntryId,
    now: DateTime<Utc>,
) -> Result<LedgerEntry, LedgerError> {
    let current = uow
        .books()
        .ledger
        .get(owner, id)
        .map(|e| e.reconciled)
        .ok_or_else(|| LedgerError::not_found("Ledger entry", id))?;
    uow.set_reconciled(owner, id, !current, now)
}

/// Sets the reconciled flag on several entries at once
///
/// Ids that are unknown, belong to another owner, or are voided are skipped.
/// Returns how many entries were updated.
pub fn bulk_reconcile(
    uow: &mut UnitOfWork<'_>,
    owner: OwnerId,
    ids: &[LedgerEntryId],
    reconciled: bool,
    now: DateTime<Utc>,
) -> Result<usize, LedgerError> {
    let mut updated = 0;
    for id in ids {
        let eligible = uow
            .books()
            .ledger
            .get(owner, *id)
            .map_or(false, |e| e.is_active());
        if eligible {
            uow.set_reconciled(owner, *id, reconciled, now)?;
            updated += 1;
        }
    }
    Ok(updated)
}
