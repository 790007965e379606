//! Repositories for the persisted books
//!
//! Every table the engine keeps in memory has a stored counterpart. Writes go
//! through [`BooksRepository::apply`] one change set at a time; the other
//! repositories are read-only views for reporting and tests.

pub mod bank_accounts;
pub mod books;
pub mod documents;
pub mod ledger;
pub mod parties;
pub mod payments;

pub use bank_accounts::{BankAccountRepository, BankAccountRow};
pub use books::{BooksRepository, CounterRow};
pub use documents::{BillRow, InvoiceRow};
pub use ledger::{LedgerEntryRow, LedgerRepository};
pub use parties::{AdvanceRow, CustomerRow, SupplierRow};
pub use payments::{ActivityRow, PaymentInRow, PaymentOutRow};

use sqlx::PgPool;

use domain_ledger::Books;

use crate::error::DatabaseError;

/// Rebuilds the books from the database
///
/// # Example
///
/// ```rust,ignore
/// let books = load_books(&pool).await?;
/// let engine = LedgerEngine::from_books(books, config, Arc::new(SystemClock));
/// ```
pub async fn load_books(pool: &PgPool) -> Result<Books, DatabaseError> {
    BooksRepository::new(pool.clone()).load().await
}
