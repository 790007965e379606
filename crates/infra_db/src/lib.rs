//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the ledger books, built on SQLx.
//!
//! # Tables
//!
//! - `bank_accounts`: account master data and the cached `current_balance`
//! - `ledger_entries`: the append-only entry log, one row per entry with
//!   each side split into kind, bank account and category columns
//! - `customers`, `suppliers`: parties with their cached dues, payable and
//!   advance figures
//! - `invoices`, `bills`: documents, a bill's audit trail as JSONB
//! - `payments_in`, `payments_out`: one row per payment with tender lines,
//!   allocations and audit log embedded as JSONB
//! - `supplier_advances`: one advance record per supplier
//! - `customer_activity`, `document_counters`
//!
//! The engine hands each call's change set to [`BooksRepository::apply`]
//! before it commits in memory. The whole set is written in one SQL
//! transaction, so the stored caches never disagree with the stored log.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, load_books, run_migrations, BooksRepository, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/ledger")).await?;
//! run_migrations(&pool).await?;
//! let books = load_books(&pool).await?;
//! BooksRepository::new(pool).apply(&changes).await?;
//! ```

pub mod codec;
pub mod error;
pub mod pool;
pub mod repositories;

pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{load_books, BankAccountRepository, BooksRepository, LedgerRepository};
