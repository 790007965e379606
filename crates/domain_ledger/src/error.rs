//! Ledger domain errors

use core_kernel::{MoneyError, TemporalError};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::account_ref::AccountRef;

/// Coarse classification of a [`LedgerError`]
///
/// Callers map this onto their own surface (HTTP status, exit code) without
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input
    Validation,
    /// Entity absent or not owned by the caller
    NotFound,
    /// Input is well formed but breaks a ledger rule
    BusinessRule,
    /// State changed between read and write, the caller should retry
    Concurrency,
    /// Arithmetic or storage failure
    Internal,
}

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or missing input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity absent, or owned by someone else
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Source account cannot cover the movement
    #[error("Insufficient funds in {account}: available {available}, requested {requested}, shortfall {shortfall}")]
    InsufficientFunds {
        account: AccountRef,
        available: Decimal,
        requested: Decimal,
        shortfall: Decimal,
    },

    /// An allocation line is larger than what is left on the document
    #[error("Allocation of {requested} to {document} exceeds its balance of {balance}")]
    AllocationExceedsBalance {
        document: String,
        balance: Decimal,
        requested: Decimal,
    },

    /// The allocations add up to more than the payment provides
    #[error("Total allocated {allocated} exceeds available {available}")]
    OverAllocation { allocated: Decimal, available: Decimal },

    /// Customer credit applied is more than the customer holds
    #[error("Credit applied {requested} exceeds available credit {available}")]
    CreditExceedsAvailable { available: Decimal, requested: Decimal },

    /// Supplier advance cannot cover the request
    #[error("Insufficient advance for supplier {supplier}: remaining {remaining}, requested {requested}")]
    InsufficientAdvance {
        supplier: String,
        remaining: Decimal,
        requested: Decimal,
    },

    /// A live payment already carries this reference for the same bank account
    #[error("Duplicate reference '{reference}' for this bank account")]
    DuplicateReference { reference: String },

    /// Payment was cancelled before
    #[error("Payment is already cancelled")]
    AlreadyCancelled,

    /// Lifecycle does not allow the requested change
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Bank account still referenced by ledger entries
    #[error("Bank account {0} has ledger entries and cannot be closed")]
    AccountInUse(String),

    /// Version read by the caller is stale
    #[error("Concurrent modification of {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Arithmetic failure
    #[error("Calculation error: {0}")]
    Money(#[from] MoneyError),

    /// Calendar failure
    #[error("Date error: {0}")]
    Temporal(#[from] TemporalError),

    /// The in-memory books cannot be accessed
    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(String),

    /// Durable storage rejected the changes; the books were left untouched
    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl LedgerError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use domain_ledger::LedgerError;
    ///
    /// let error = LedgerError::not_found("Invoice", "INV-42");
    /// assert!(error.to_string().contains("Invoice"));
    /// ```
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound { entity, id: id.to_string() }
    }

    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    /// Builds an insufficient funds error, computing the shortfall
    pub fn insufficient_funds(account: AccountRef, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            available,
            requested,
            shortfall: requested - available,
        }
    }

    /// Maps the error onto the coarse taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) | LedgerError::Temporal(_) => ErrorKind::Validation,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::InsufficientFunds { .. }
            | LedgerError::AllocationExceedsBalance { .. }
            | LedgerError::OverAllocation { .. }
            | LedgerError::CreditExceedsAvailable { .. }
            | LedgerError::InsufficientAdvance { .. }
            | LedgerError::DuplicateReference { .. }
            | LedgerError::AlreadyCancelled
            | LedgerError::InvalidStatusTransition { .. }
            | LedgerError::AccountInUse(_) => ErrorKind::BusinessRule,
            LedgerError::ConcurrencyConflict { .. } => ErrorKind::Concurrency,
            LedgerError::Money(_)
            | LedgerError::StoreUnavailable(_)
            | LedgerError::Persistence(_) => ErrorKind::Internal,
        }
    }

    /// Returns true when retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict { .. } | LedgerError::Persistence(_))
    }
}
