//! The whole books as one unit of persistence
//!
//! [`BooksRepository::apply`] writes a [`ChangeSet`] in a single SQL
//! transaction; [`BooksRepository::load`] reads every table back into
//! [`Books`] at startup.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use core_kernel::OwnerId;
use domain_ledger::{Books, ChangeSet};

use crate::error::DatabaseError;
use crate::repositories::bank_accounts::{delete_account, upsert_account, BankAccountRepository};
use crate::repositories::documents::{upsert_bill, upsert_invoice, BillRow, InvoiceRow, SELECT_BILL, SELECT_INVOICE};
use crate::repositories::ledger::{upsert_entry, LedgerRepository};
use crate::repositories::parties::{
    upsert_advance, upsert_customer, upsert_supplier, AdvanceRow, CustomerRow, SupplierRow,
    SELECT_ADVANCE, SELECT_CUSTOMER, SELECT_SUPPLIER,
};
use crate::repositories::payments::{
    insert_activity, insert_payment_in, upsert_payment_out, ActivityRow, PaymentInRow, PaymentOutRow,
    SELECT_ACTIVITY, SELECT_PAYMENT_IN, SELECT_PAYMENT_OUT,
};

/// Reads and writes every table of the books
#[derive(Debug, Clone)]
pub struct BooksRepository {
    pool: PgPool,
}

impl BooksRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Writes every record of `changes`, all or nothing
    ///
    /// Rows go in foreign-key order: parties and bank accounts, documents,
    /// ledger entries, payments, then advances, activity and counters.
    /// Closed bank accounts are deleted last.
    ///
    /// # Errors
    ///
    /// Any failing statement aborts the transaction and nothing is stored
    pub async fn apply(&self, changes: &ChangeSet) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        write_changes(&mut *tx, changes).await?;
        tx.commit().await?;

        debug!(records = changes.len(), entries = changes.entries.len(), "change set stored");
        Ok(())
    }

    /// Rebuilds the books from every table
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::CorruptRow` if a stored row does not decode
    pub async fn load(&self) -> Result<Books, DatabaseError> {
        let mut books = Books::new();

        for account in BankAccountRepository::new(self.pool.clone()).load_all().await? {
            books.bank_accounts.open(account)?;
        }
        books.ledger = LedgerRepository::new(self.pool.clone()).load_ledger().await?;

        for row in sqlx::query_as::<_, CustomerRow>(SELECT_CUSTOMER).fetch_all(&self.pool).await? {
            let customer = row.into_customer()?;
            books.customers.insert(customer.id, customer);
        }
        for row in sqlx::query_as::<_, SupplierRow>(SELECT_SUPPLIER).fetch_all(&self.pool).await? {
            let supplier = row.into_supplier()?;
            books.suppliers.insert(supplier.id, supplier);
        }
        for row in sqlx::query_as::<_, InvoiceRow>(SELECT_INVOICE).fetch_all(&self.pool).await? {
            let invoice = row.into_invoice()?;
            books.invoices.insert(invoice.id, invoice);
        }
        for row in sqlx::query_as::<_, BillRow>(SELECT_BILL).fetch_all(&self.pool).await? {
            let bill = row.into_bill()?;
            books.bills.insert(bill.id, bill);
        }
        for row in sqlx::query_as::<_, AdvanceRow>(SELECT_ADVANCE).fetch_all(&self.pool).await? {
            books.advances.insert(row.into_advance()?);
        }
        for row in sqlx::query_as::<_, PaymentInRow>(SELECT_PAYMENT_IN).fetch_all(&self.pool).await? {
            let payment = row.into_payment()?;
            books.payments_in.insert(payment.id, payment);
        }
        for row in sqlx::query_as::<_, PaymentOutRow>(SELECT_PAYMENT_OUT).fetch_all(&self.pool).await? {
            let payment = row.into_payment()?;
            books.payments_out.insert(payment.id, payment);
        }
        books.activity = sqlx::query_as::<_, ActivityRow>(&format!("{} ORDER BY created_at, id", SELECT_ACTIVITY))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ActivityRow::into_entry)
            .collect::<Result<_, _>>()?;

        for row in sqlx::query_as::<_, CounterRow>("SELECT owner_id, prefix, counter_date, value FROM document_counters")
            .fetch_all(&self.pool)
            .await?
        {
            let (key, value) = row.into_counter()?;
            books.sequences.seed(key, value);
        }

        info!(
            entries = books.ledger.len(),
            customers = books.customers.len(),
            suppliers = books.suppliers.len(),
            payments_in = books.payments_in.len(),
            payments_out = books.payments_out.len(),
            "books restored from database"
        );
        Ok(books)
    }
}

async fn write_changes(conn: &mut PgConnection, changes: &ChangeSet) -> Result<(), DatabaseError> {
    for customer in &changes.customers {
        upsert_customer(conn, customer).await?;
    }
    for supplier in &changes.suppliers {
        upsert_supplier(conn, supplier).await?;
    }
    for account in &changes.bank_accounts {
        upsert_account(conn, account).await?;
    }
    for invoice in &changes.invoices {
        upsert_invoice(conn, invoice).await?;
    }
    for bill in &changes.bills {
        upsert_bill(conn, bill).await?;
    }
    for entry in &changes.entries {
        upsert_entry(conn, entry).await?;
    }
    for payment in &changes.payments_in {
        insert_payment_in(conn, payment).await?;
    }
    for payment in &changes.payments_out {
        upsert_payment_out(conn, payment).await?;
    }
    for record in &changes.advances {
        upsert_advance(conn, record).await?;
    }
    for line in &changes.activity {
        insert_activity(conn, line).await?;
    }
    for ((owner, prefix, date), value) in &changes.counters {
        sqlx::query(
            r#"
            INSERT INTO document_counters (owner_id, prefix, counter_date, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (owner_id, prefix, counter_date) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(Uuid::from(*owner))
        .bind(prefix)
        .bind(*date)
        .bind(encode_day_counter(*value)?)
        .execute(&mut *conn)
        .await?;
    }
    for id in &changes.closed_bank_accounts {
        delete_account(conn, *id).await?;
    }
    Ok(())
}

fn encode_day_counter(value: u32) -> Result<i32, DatabaseError> {
    i32::try_from(value).map_err(|_| DatabaseError::CorruptRow(format!("document counter {} overflows INTEGER", value)))
}

/// Database row for a per-day document counter
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CounterRow {
    pub owner_id: Uuid,
    pub prefix: String,
    pub counter_date: NaiveDate,
    pub value: i32,
}

impl CounterRow {
    pub fn into_counter(self) -> Result<((OwnerId, String, NaiveDate), u32), DatabaseError> {
        let value = u32::try_from(self.value)
            .map_err(|_| DatabaseError::CorruptRow(format!("negative document counter {}", self.value)))?;
        Ok(((OwnerId::from_uuid(self.owner_id), self.prefix, self.counter_date), value))
    }
}
