//! Column encodings for ledger types
//!
//! An [`AccountRef`] is spread over three columns so bank sides can carry a
//! foreign key: `<side>_kind`, `<side>_bank_account_id` and `<side>_category`.

use uuid::Uuid;

use core_kernel::BankAccountId;
use domain_ledger::{AccountRef, BankAccountStatus, ExternalCategory};

use crate::error::DatabaseError;

/// One side of an entry as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountColumns {
    pub kind: &'static str,
    pub bank_account_id: Option<Uuid>,
    pub category: Option<String>,
}

impl AccountColumns {
    pub fn encode(account: &AccountRef) -> Self {
        match account {
            AccountRef::Cash => Self { kind: "cash", bank_account_id: None, category: None },
            AccountRef::Bank(id) => Self {
                kind: "bank",
                bank_account_id: Some(Uuid::from(*id)),
                category: None,
            },
            AccountRef::External(category) => Self {
                kind: "external",
                bank_account_id: None,
                category: Some(category.as_str().to_string()),
            },
        }
    }
}

/// Rebuilds an account reference from its columns
///
/// # Errors
///
/// Returns `DatabaseError::CorruptRow` if the kind is unknown or the column
/// it needs is missing
pub fn decode_account(
    kind: &str,
    bank_account_id: Option<Uuid>,
    category: Option<&str>,
) -> Result<AccountRef, DatabaseError> {
    match (kind, bank_account_id, category) {
        ("cash", _, _) => Ok(AccountRef::Cash),
        ("bank", Some(id), _) => Ok(AccountRef::Bank(BankAccountId::from_uuid(id))),
        ("external", _, Some(name)) => Ok(AccountRef::External(ExternalCategory::new(name)?)),
        (kind, _, _) => Err(DatabaseError::CorruptRow(format!(
            "account side '{}' is missing its column",
            kind
        ))),
    }
}

pub fn encode_status(status: BankAccountStatus) -> &'static str {
    match status {
        BankAccountStatus::Active => "active",
        BankAccountStatus::Inactive => "inactive",
    }
}

pub fn decode_status(value: &str) -> Result<BankAccountStatus, DatabaseError> {
    match value {
        "active" => Ok(BankAccountStatus::Active),
        "inactive" => Ok(BankAccountStatus::Inactive),
        other => Err(DatabaseError::CorruptRow(format!("unknown bank account status '{}'", other))),
    }
}

/// Sequence numbers are `u64` in memory and `BIGINT` in PostgreSQL
pub fn encode_counter(value: u64) -> Result<i64, DatabaseError> {
    i64::try_from(value).map_err(|_| DatabaseError::CorruptRow(format!("counter {} overflows BIGINT", value)))
}

pub fn decode_counter(value: i64) -> Result<u64, DatabaseError> {
    u64::try_from(value).map_err(|_| DatabaseError::CorruptRow(format!("negative counter {}", value)))
}
