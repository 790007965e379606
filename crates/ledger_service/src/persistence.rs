//! Write-through of engine change sets to PostgreSQL
//!
//! The engine persists from inside its write lock, on whatever thread runs
//! the call. [`LedgerService`](crate::LedgerService) runs every write on the
//! blocking pool, so the sink can block on the runtime until the SQL
//! transaction has committed.

use tokio::runtime::Handle;
use tracing::warn;

use domain_ledger::{ChangeSet, ChangeSink, LedgerError};
use infra_db::{BooksRepository, DatabasePool};

/// Stores each change set before the engine commits it
#[derive(Debug, Clone)]
pub struct WriteThrough {
    repository: BooksRepository,
    runtime: Handle,
}

impl WriteThrough {
    pub fn new(pool: DatabasePool, runtime: Handle) -> Self {
        Self { repository: BooksRepository::new(pool), runtime }
    }
}

impl ChangeSink for WriteThrough {
    fn persist(&self, operation: &'static str, changes: &ChangeSet) -> Result<(), LedgerError> {
        self.runtime.block_on(self.repository.apply(changes)).map_err(|error| {
            warn!(operation, records = changes.len(), %error, "change set not stored");
            LedgerError::Persistence(error.to_string())
        })
    }
}
