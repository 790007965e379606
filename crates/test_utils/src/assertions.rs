//! Custom Test Assertions
//!
//! Assertion helpers for ledger types with messages that say which balance
//! was off and by how much.

use rust_decimal::Decimal;

use core_kernel::{BankAccountId, Money, OwnerId};
use domain_ledger::{ErrorKind, LedgerEngine, LedgerError};

/// Asserts that two amounts differ by at most `tolerance`
///
/// # Panics
///
/// Panics if the amounts differ by more than `tolerance`
pub fn assert_money_approx_eq(actual: Money, expected: Money, tolerance: Decimal) {
    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual,
        expected,
        diff,
        tolerance
    );
}

pub fn assert_money_zero(money: Money) {
    assert!(money.is_zero(), "Expected zero, got {}", money);
}

pub fn assert_money_non_negative(money: Money) {
    assert!(!money.is_negative(), "Expected a non-negative amount, got {}", money);
}

/// Asserts a bank account's cached balance
pub fn assert_bank_balance(engine: &LedgerEngine, owner: OwnerId, id: BankAccountId, expected: Money) {
    let account = engine
        .bank_account(owner, id)
        .unwrap_or_else(|e| panic!("bank account {} not readable: {}", id, e));
    assert_eq!(
        account.current_balance(),
        expected,
        "Bank {} balance mismatch",
        account.bank_name
    );
}

/// Asserts that every cache of `owner` agrees with the ledger and documents,
/// and that cash in hand is not negative
pub fn assert_books_consistent(engine: &LedgerEngine, owner: OwnerId) {
    let report = engine
        .audit(owner)
        .unwrap_or_else(|e| panic!("audit failed: {}", e));
    assert!(report.is_clean(), "Drift detected: {:#?}", report.drifts);

    let cash = engine
        .cash_balance(owner)
        .unwrap_or_else(|e| panic!("cash balance failed: {}", e));
    assert_money_non_negative(cash);
}

/// Asserts that a result is an error of the given kind
pub fn assert_error_kind<T: std::fmt::Debug>(result: Result<T, LedgerError>, expected: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected a {:?} error, got Ok({:?})", expected, value),
        Err(error) => assert_eq!(
            error.kind(),
            expected,
            "Expected a {:?} error, got {:?}: {}",
            expected,
            error.kind(),
            error
        ),
    }
}
