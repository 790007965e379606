//! Core Kernel - Foundational types for the cash/bank ledger
//!
//! This crate provides the building blocks shared by the ledger engine,
//! persistence and service layers:
//! - Money with precise decimal arithmetic and the settlement tolerance
//! - Calendar ranges resolved in the business timezone
//! - Strongly-typed identifiers

pub mod money;
pub mod temporal;
pub mod identifiers;

pub use money::{Money, MoneyError, MONEY_SCALE, PAID_TOLERANCE};
pub use temporal::{DateRange, Timezone, TemporalError, UtcBounds};
pub use identifiers::{
    IdParseError, OwnerId, CustomerId, SupplierId, InvoiceId, BillId,
    BankAccountId, LedgerEntryId, PaymentInId, PaymentOutId, ActivityEntryId,
};
