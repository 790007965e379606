//! Bank account repository
//!
//! Stores the account master data together with the cached
//! `current_balance`. Rows are written from a books change set, so the stored
//! balance always matches the stored ledger rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use core_kernel::{BankAccountId, Money, OwnerId};
use domain_ledger::{BankAccount, BankAccountType};

use crate::codec::{decode_counter, decode_status, encode_counter, encode_status};
use crate::error::DatabaseError;

const SELECT_ACCOUNT: &str = r#"
    SELECT id, owner_id, bank_name, account_number, account_type, branch, ifsc,
           opening_balance, current_balance, status, version, created_at
    FROM bank_accounts
"#;

#[derive(Debug, Clone)]
pub struct BankAccountRepository {
    pool: PgPool,
}

impl BankAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets an account owned by `owner`
    pub async fn find(&self, owner: OwnerId, id: BankAccountId) -> Result<BankAccount, DatabaseError> {
        let row = sqlx::query_as::<_, BankAccountRow>(&format!("{} WHERE id = $1 AND owner_id = $2", SELECT_ACCOUNT))
            .bind(Uuid::from(id))
            .bind(Uuid::from(owner))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Bank account", id))?;

        row.into_account()
    }

    /// Accounts of one owner, oldest first
    pub async fn list_for_owner(&self, owner: OwnerId) -> Result<Vec<BankAccount>, DatabaseError> {
        let rows = sqlx::query_as::<_, BankAccountRow>(&format!(
            "{} WHERE owner_id = $1 ORDER BY created_at, id",
            SELECT_ACCOUNT
        ))
        .bind(Uuid::from(owner))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BankAccountRow::into_account).collect()
    }

    /// Every stored account, used to warm the in-memory balance cache
    pub async fn load_all(&self) -> Result<Vec<BankAccount>, DatabaseError> {
        let rows = sqlx::query_as::<_, BankAccountRow>(&format!("{} ORDER BY created_at, id", SELECT_ACCOUNT))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(BankAccountRow::into_account).collect()
    }
}

/// Inserts an account or overwrites its mutable columns
///
/// # Errors
///
/// Returns `DatabaseError::DuplicateEntry` if the owner already has another
/// account with the same bank and number
pub(crate) async fn upsert_account(conn: &mut PgConnection, account: &BankAccount) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO bank_accounts (
            id, owner_id, bank_name, account_number, account_type, branch, ifsc,
            opening_balance, current_balance, status, version, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO UPDATE SET
            branch = EXCLUDED.branch,
            ifsc = EXCLUDED.ifsc,
            current_balance = EXCLUDED.current_balance,
            status = EXCLUDED.status,
            version = EXCLUDED.version
        "#,
    )
    .bind(Uuid::from(account.id))
    .bind(Uuid::from(account.owner))
    .bind(&account.bank_name)
    .bind(&account.account_number)
    .bind(account.account_type.as_str())
    .bind(&account.branch)
    .bind(&account.ifsc)
    .bind(account.opening_balance.amount())
    .bind(account.current_balance().amount())
    .bind(encode_status(account.status))
    .bind(encode_counter(account.version)?)
    .bind(account.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(account = %account.id, "bank account written");
    Ok(())
}

/// Deletes an account no ledger row or payment refers to
///
/// # Errors
///
/// Returns `DatabaseError::ForeignKeyViolation` while rows still reference
/// the account
pub(crate) async fn delete_account(conn: &mut PgConnection, id: BankAccountId) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM bank_accounts WHERE id = $1")
        .bind(Uuid::from(id))
        .execute(&mut *conn)
        .await?;
    debug!(account = %id, "bank account deleted");
    Ok(())
}

/// Database row for a bank account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BankAccountRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub bank_name: String,
    pub account_number: String,
    pub account_type: String,
    pub branch: Option<String>,
    pub ifsc: Option<String>,
    pub opening_balance: Decimal,
    pub current_balance: Decimal,
    pub status: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl BankAccountRow {
    pub fn into_account(self) -> Result<BankAccount, DatabaseError> {
        let mut account = BankAccount::new(
            OwnerId::from_uuid(self.owner_id),
            self.bank_name,
            self.account_number,
            Money::new(self.opening_balance),
            self.created_at,
        )
        .with_type(BankAccountType::parse(&self.account_type)?)
        .with_current_balance(Money::new(self.current_balance));
        account.id = BankAccountId::from_uuid(self.id);
        account.branch = self.branch;
        account.ifsc = self.ifsc;
        account.status = decode_status(&self.status)?;
        account.version = decode_counter(self.version)?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_ledger::BankAccountStatus;
    use rust_decimal_macros::dec;

    fn row() -> BankAccountRow {
        BankAccountRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            bank_name: "HDFC".to_string(),
            account_number: "50100012345678".to_string(),
            account_type: "current".to_string(),
            branch: Some("Koramangala".to_string()),
            ifsc: Some("HDFC0000053".to_string()),
            opening_balance: dec!(1000),
            current_balance: dec!(1250.50),
            status: "inactive".to_string(),
            version: 4,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_keeps_stored_balance_and_identity() {
        let row = row();
        let id = row.id;

        let account = row.into_account().unwrap();

        assert_eq!(Uuid::from(account.id), id);
        assert_eq!(account.account_type, BankAccountType::Current);
        assert_eq!(account.opening_balance, Money::new(dec!(1000)));
        assert_eq!(account.current_balance(), Money::new(dec!(1250.50)));
        assert_eq!(account.status, BankAccountStatus::Inactive);
        assert_eq!(account.version, 4);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mut row = row();
        row.account_type = "crypto".to_string();

        assert!(matches!(row.into_account(), Err(DatabaseError::CorruptRow(_))));
    }
}
