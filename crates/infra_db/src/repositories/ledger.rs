//! Ledger entry repository
//!
//! Entries are written by [`upsert_entry`] as part of a books change set.
//! Once stored only the reconciliation and void columns of a row change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use core_kernel::{LedgerEntryId, Money, OwnerId};
use domain_ledger::{LedgerEntry, TransactionLedger};

use crate::codec::{decode_account, decode_counter, encode_counter, AccountColumns};
use crate::error::DatabaseError;

const SELECT_ENTRY: &str = r#"
    SELECT id, owner_id, sequence, kind, amount,
           from_kind, from_bank_account_id, from_category,
           to_kind, to_bank_account_id, to_category,
           entry_date, created_at, description, reference,
           reconciled, reconciled_at, voided_by, reverses
    FROM ledger_entries
"#;

/// Read side of the append-only ledger
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Entries of one owner in sequence order, voided pairs included
    pub async fn entries_for_owner(&self, owner: OwnerId) -> Result<Vec<LedgerEntry>, DatabaseError> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(&format!("{} WHERE owner_id = $1 ORDER BY sequence", SELECT_ENTRY))
            .bind(Uuid::from(owner))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(LedgerEntryRow::into_entry).collect()
    }

    /// Rebuilds the whole in-memory ledger
    pub async fn load_ledger(&self) -> Result<TransactionLedger, DatabaseError> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(&format!("{} ORDER BY sequence", SELECT_ENTRY))
            .fetch_all(&self.pool)
            .await?;
        let entries = rows
            .into_iter()
            .map(LedgerEntryRow::into_entry)
            .collect::<Result<Vec<_>, _>>()?;

        info!(entries = entries.len(), "ledger loaded");
        Ok(TransactionLedger::from_entries(entries))
    }
}

/// Inserts a new entry or refreshes the mutable columns of a stored one
///
/// A void and its compensating entry reference each other; the foreign keys
/// are deferred so both can be written in one transaction in any order.
pub(crate) async fn upsert_entry(conn: &mut PgConnection, entry: &LedgerEntry) -> Result<(), DatabaseError> {
    let from = AccountColumns::encode(&entry.from);
    let to = AccountColumns::encode(&entry.to);

    sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, owner_id, sequence, kind, amount,
            from_kind, from_bank_account_id, from_category,
            to_kind, to_bank_account_id, to_category,
            entry_date, created_at, description, reference,
            reconciled, reconciled_at, voided_by, reverses
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        ON CONFLICT (id) DO UPDATE SET
            reconciled = EXCLUDED.reconciled,
            reconciled_at = EXCLUDED.reconciled_at,
            voided_by = EXCLUDED.voided_by
        "#,
    )
    .bind(Uuid::from(entry.id))
    .bind(Uuid::from(entry.owner))
    .bind(encode_counter(entry.sequence)?)
    .bind(entry.kind.as_str())
    .bind(entry.amount.amount())
    .bind(from.kind)
    .bind(from.bank_account_id)
    .bind(&from.category)
    .bind(to.kind)
    .bind(to.bank_account_id)
    .bind(&to.category)
    .bind(entry.date)
    .bind(entry.created_at)
    .bind(&entry.description)
    .bind(&entry.reference)
    .bind(entry.reconciled)
    .bind(entry.reconciled_at)
    .bind(entry.voided_by.map(Uuid::from))
    .bind(entry.reverses.map(Uuid::from))
    .execute(&mut *conn)
    .await?;

    debug!(entry = %entry.id, sequence = entry.sequence, "ledger entry written");
    Ok(())
}

/// Database row for a ledger entry
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerEntryRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub sequence: i64,
    pub kind: String,
    pub amount: Decimal,
    pub from_kind: String,
    pub from_bank_account_id: Option<Uuid>,
    pub from_category: Option<String>,
    pub to_kind: String,
    pub to_bank_account_id: Option<Uuid>,
    pub to_category: Option<String>,
    pub entry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub reference: Option<String>,
    pub reconciled: bool,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub voided_by: Option<Uuid>,
    pub reverses: Option<Uuid>,
}

impl LedgerEntryRow {
    pub fn into_entry(self) -> Result<LedgerEntry, DatabaseError> {
        Ok(LedgerEntry {
            id: LedgerEntryId::from_uuid(self.id),
            owner: OwnerId::from_uuid(self.owner_id),
            kind: self.kind.parse()?,
            amount: Money::new(self.amount),
            from: decode_account(&self.from_kind, self.from_bank_account_id, self.from_category.as_deref())?,
            to: decode_account(&self.to_kind, self.to_bank_account_id, self.to_category.as_deref())?,
            date: self.entry_date,
            created_at: self.created_at,
            sequence: decode_counter(self.sequence)?,
            description: self.description,
            reference: self.reference,
            reconciled: self.reconciled,
            reconciled_at: self.reconciled_at,
            voided_by: self.voided_by.map(LedgerEntryId::from_uuid),
            reverses: self.reverses.map(LedgerEntryId::from_uuid),
        })
    }
}
