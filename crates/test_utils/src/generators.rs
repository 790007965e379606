//! Property-Based Test Generators
//!
//! proptest strategies for amounts, methods and receipt splits.

use proptest::prelude::*;

use core_kernel::Money;
use domain_ledger::{AccountRef, PaymentMethod, ReceiptLine};

/// Positive amounts in paise, up to ₹1,00,00,000
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(Money::from_minor)
}

/// Amounts that fit comfortably in a seeded test account
pub fn small_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..5_000_000i64).prop_map(Money::from_minor)
}

/// Methods that settle immediately
pub fn immediate_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Upi),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::BankTransfer),
    ]
}

/// External categories, never the cash sentinel
pub fn category_strategy() -> impl Strategy<Value = AccountRef> {
    "[a-z]{3,12}(-[a-z]{3,8})?"
        .prop_filter("cash is not a category", |name| name != "cash")
        .prop_map(|name| AccountRef::external(name).unwrap())
}

/// One to four receipt lines with positive amounts
pub fn receipt_lines_strategy() -> impl Strategy<Value = Vec<ReceiptLine>> {
    prop::collection::vec((immediate_method_strategy(), small_money_strategy()), 1..=4)
        .prop_map(|lines| {
            lines
                .into_iter()
                .map(|(method, amount)| ReceiptLine::new(method, amount))
                .collect()
        })
}
