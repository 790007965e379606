//! Pre-built Test Fixtures
//!
//! Fixed amounts, instants and ids for predictable unit tests, plus random
//! party names for tests that only need something plausible.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fake::faker::company::en::CompanyName;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{Money, OwnerId};

/// Fixture for rupee amounts
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical invoice total
    pub fn invoice_total() -> Money {
        Money::new(dec!(1000.00))
    }

    /// A typical supplier bill total
    pub fn bill_total() -> Money {
        Money::new(dec!(5000.00))
    }

    /// Opening balance of a funded bank account
    pub fn bank_opening() -> Money {
        Money::new(dec!(25000.00))
    }

    /// Less than the settlement tolerance
    pub fn paisa() -> Money {
        Money::new(dec!(0.01))
    }
}

/// Fixture for instants and business days
///
/// The business timezone is Asia/Kolkata, so 06:00 UTC is 11:30 local time
/// on the same day.
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Instant the test clock starts at: 10 March 2024, 11:30 IST
    pub fn business_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap()
    }

    /// Late evening UTC on the 9th, already the 10th in IST
    pub fn just_after_local_midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 18, 45, 0).unwrap()
    }

    pub fn business_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    pub fn bill_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// A deterministic owner for snapshot-style assertions
    pub fn owner_id() -> OwnerId {
        OwnerId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    /// A second owner for isolation tests
    pub fn other_owner_id() -> OwnerId {
        OwnerId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap())
    }
}

/// Fixture for names and numbers
pub struct StringFixtures;

impl StringFixtures {
    pub fn bank_name() -> &'static str {
        "HDFC Bank"
    }

    pub fn account_number() -> &'static str {
        "50100012345678"
    }

    /// Random person name for a customer
    pub fn customer_name() -> String {
        Name().fake()
    }

    /// Random business name for a supplier
    pub fn supplier_name() -> String {
        CompanyName().fake()
    }
}
