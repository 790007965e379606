//! Typed identifiers
//!
//! Every entity id is a UUID behind its own type, shown with a short tag such
//! as `BNK-…` or `TXN-…`. Parsing accepts the tagged form and the bare UUID,
//! and rejects an id carrying another entity's tag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Why a string is not an id of the requested type
#[derive(Debug, Error, PartialEq)]
pub enum IdParseError {
    #[error("expected a {expected} id, got a {found} id")]
    WrongTag { expected: &'static str, found: String },

    #[error("malformed {tag} id: {source}")]
    Malformed {
        tag: &'static str,
        #[source]
        source: uuid::Error,
    },
}

fn parse_tagged(input: &str, tag: &'static str) -> Result<Uuid, IdParseError> {
    let input = input.trim();
    // tags are short and upper case, which no UUID's first group is
    let raw = match input.split_once('-') {
        Some((head, rest)) if head.len() <= 4 && head.chars().all(|c| c.is_ascii_uppercase()) => {
            if head != tag {
                return Err(IdParseError::WrongTag { expected: tag, found: head.to_string() });
            }
            rest
        }
        _ => input,
    };
    Uuid::parse_str(raw).map_err(|source| IdParseError::Malformed { tag, source })
}

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $tag:literal, $generate:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self($generate)
            }

            /// Time-ordered id, sorts by creation
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Tag shown before the UUID
            pub fn prefix() -> &'static str {
                $tag
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $tag, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_tagged(s, $tag).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(
    /// The business whose books an operation touches
    OwnerId, "USR", Uuid::new_v4()
);
define_id!(CustomerId, "CUS", Uuid::new_v4());
define_id!(SupplierId, "SUP", Uuid::new_v4());
define_id!(InvoiceId, "INV", Uuid::new_v4());
define_id!(BillId, "BILL", Uuid::new_v4());
define_id!(BankAccountId, "BNK", Uuid::new_v4());
define_id!(
    /// Ledger entries are time-ordered so stored rows cluster by insertion
    LedgerEntryId, "TXN", Uuid::now_v7()
);
define_id!(PaymentInId, "PIN", Uuid::new_v4());
define_id!(PaymentOutId, "POUT", Uuid::new_v4());
define_id!(ActivityEntryId, "ACT", Uuid::now_v7());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_display() {
        assert!(BankAccountId::new().to_string().starts_with("BNK-"));
        assert!(LedgerEntryId::new().to_string().starts_with("TXN-"));
    }

    #[test]
    fn test_wrong_tag_is_named() {
        let supplier = SupplierId::new().to_string();

        assert_eq!(
            supplier.parse::<BankAccountId>(),
            Err(IdParseError::WrongTag { expected: "BNK", found: "SUP".to_string() })
        );
    }

    #[test]
    fn test_upper_case_uuid_is_not_a_tag() {
        let uuid = Uuid::new_v4();
        let parsed: PaymentOutId = uuid.to_string().to_uppercase().parse().unwrap();
        assert_eq!(parsed.as_uuid(), &uuid);
    }

    #[test]
    fn test_malformed_body() {
        let err = "TXN-not-a-uuid".parse::<LedgerEntryId>().unwrap_err();
        assert!(matches!(err, IdParseError::Malformed { tag: "TXN", .. }));
    }

    #[test]
    fn test_entry_ids_sort_by_creation() {
        let first = LedgerEntryId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(first < LedgerEntryId::new());
    }
}
