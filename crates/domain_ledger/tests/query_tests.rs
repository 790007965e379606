//! Tests for account statements and running balances

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{BankAccountId, DateRange, Money, OwnerId};

use domain_ledger::{
    AccountRef, BankAccount, CashDirection, CashTransactionRequest, EngineConfig, LedgerEngine,
    LedgerError, LedgerQuery, ManualClock, NewPaymentOut, PaymentMethod, RowDirection, Supplier,
};

fn engine() -> (LedgerEngine, OwnerId) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 20, 6, 0, 0).unwrap()));
    (LedgerEngine::with_clock(EngineConfig::default(), clock), OwnerId::new())
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn cash(engine: &LedgerEngine, owner: OwnerId, direction: CashDirection, amount: Money, on: DateTime<Utc>) {
    engine
        .create_cash_transaction(
            owner,
            CashTransactionRequest::new(direction, AccountRef::external("sundry").unwrap(), amount).on_date(on),
        )
        .unwrap();
}

/// Cash in on the 1st, out on the 5th, and two receipts on the 10th in
/// Asia/Kolkata, one of them still the 9th in UTC
fn seeded() -> (LedgerEngine, OwnerId) {
    let (engine, owner) = engine();
    cash(&engine, owner, CashDirection::In, Money::new(dec!(1000)), at(1, 6));
    cash(&engine, owner, CashDirection::Out, Money::new(dec!(200)), at(5, 6));
    cash(&engine, owner, CashDirection::In, Money::new(dec!(500)), at(10, 6));
    cash(&engine, owner, CashDirection::In, Money::new(dec!(50)), at(9, 20));
    (engine, owner)
}

// ============================================================================
// Statement tests
// ============================================================================

mod statement_tests {
    use super::*;

    #[test]
    fn test_full_history_runs_from_zero() {
        let (engine, owner) = seeded();

        let statement = engine
            .account_ledger(owner, &AccountRef::Cash, DateRange::all(), None)
            .unwrap();

        assert_eq!(statement.account_opening_balance, Money::ZERO);
        assert_eq!(statement.summary.opening_balance, Money::ZERO);
        let running: Vec<Money> = statement.rows.iter().map(|r| r.running_balance).collect();
        assert_eq!(
            running,
            vec![
                Money::new(dec!(1000)),
                Money::new(dec!(800)),
                Money::new(dec!(850)),
                Money::new(dec!(1350)),
            ]
        );
        assert_eq!(statement.rows[1].direction, RowDirection::Debit);
        assert_eq!(statement.rows[1].debit, Money::new(dec!(200)));
        assert_eq!(statement.summary.total_credits, Money::new(dec!(1550)));
        assert_eq!(statement.summary.total_debits, Money::new(dec!(200)));
        assert_eq!(statement.summary.closing_balance, engine.cash_balance(owner).unwrap());
    }

    #[test]
    fn test_range_replays_earlier_entries_into_opening() {
        let (engine, owner) = seeded();

        let statement = engine
            .account_ledger(owner, &AccountRef::Cash, DateRange::between(date(5), date(9)).unwrap(), None)
            .unwrap();

        assert_eq!(statement.summary.opening_balance, Money::new(dec!(1000)));
        assert_eq!(statement.rows.len(), 1);
        assert_eq!(statement.summary.closing_balance, Money::new(dec!(800)));
    }

    #[test]
    fn test_days_follow_business_timezone() {
        let (engine, owner) = seeded();

        let statement = engine
            .account_ledger(owner, &AccountRef::Cash, DateRange::between(date(10), date(10)).unwrap(), None)
            .unwrap();

        // 20:00 UTC on the 9th is 01:30 on the 10th in Kolkata
        assert_eq!(statement.rows.len(), 2);
        assert_eq!(statement.rows[0].credit, Money::new(dec!(50)));
        assert_eq!(statement.summary.opening_balance, Money::new(dec!(800)));
        assert_eq!(statement.summary.closing_balance, Money::new(dec!(1350)));
    }

    #[test]
    fn test_empty_range_closes_at_opening() {
        let (engine, owner) = seeded();

        let statement = engine
            .account_ledger(owner, &AccountRef::Cash, DateRange::starting(date(15)), None)
            .unwrap();

        assert!(statement.rows.is_empty());
        assert_eq!(statement.summary.opening_balance, Money::new(dec!(1350)));
        assert_eq!(statement.summary.closing_balance, statement.summary.opening_balance);
    }

    #[test]
    fn test_reconciled_filter_narrows_rows_only() {
        let (engine, owner) = seeded();
        let first = engine.account_transactions(owner, &AccountRef::Cash).unwrap().pop().unwrap();
        engine.toggle_reconciliation(owner, first.id).unwrap();

        let reconciled = engine
            .account_ledger(owner, &AccountRef::Cash, DateRange::all(), Some(true))
            .unwrap();
        assert_eq!(reconciled.rows.len(), 1);
        assert_eq!(reconciled.rows[0].entry.id, first.id);

        let later = engine
            .account_ledger(owner, &AccountRef::Cash, DateRange::starting(date(5)), Some(true))
            .unwrap();
        assert!(later.rows.is_empty());
        assert_eq!(later.summary.opening_balance, Money::new(dec!(1000)));

        let open = engine
            .account_ledger(owner, &AccountRef::Cash, DateRange::all(), Some(false))
            .unwrap();
        assert_eq!(open.rows.len(), 3);
    }

    #[test]
    fn test_transactions_are_newest_first() {
        let (engine, owner) = seeded();

        let entries = engine.account_transactions(owner, &AccountRef::Cash).unwrap();

        let dates: Vec<DateTime<Utc>> = entries.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![at(10, 6), at(9, 20), at(5, 6), at(1, 6)]);
    }

    #[test]
    fn test_balance_as_of_a_past_moment() {
        let (engine, owner) = seeded();
        let books = engine.snapshot().unwrap();
        let query = LedgerQuery::new(&books, &engine.config().timezone);

        assert_eq!(
            query.balance_as_of(owner, &AccountRef::Cash, at(6, 0)).unwrap(),
            Money::new(dec!(800))
        );
        assert_eq!(query.entries_between(owner, DateRange::between(date(1), date(5)).unwrap()).unwrap().len(), 2);
    }
}

// ============================================================================
// Bank statement tests
// ============================================================================

mod bank_statement_tests {
    use super::*;

    #[test]
    fn test_bank_statement_starts_at_opening_balance() {
        let (engine, owner) = engine();
        let bank = engine
            .open_bank_account(owner, BankAccount::new(owner, "HDFC", "1234", Money::new(dec!(5000)), Utc::now()))
            .unwrap();
        engine
            .create_cash_transaction(
                owner,
                CashTransactionRequest::new(CashDirection::In, AccountRef::Bank(bank.id), Money::new(dec!(700)))
                    .on_date(at(3, 6)),
            )
            .unwrap();

        let statement = engine
            .account_ledger(owner, &AccountRef::Bank(bank.id), DateRange::all(), None)
            .unwrap();

        assert_eq!(statement.account_opening_balance, Money::new(dec!(5000)));
        assert_eq!(statement.rows[0].direction, RowDirection::Debit);
        assert_eq!(statement.summary.closing_balance, Money::new(dec!(4300)));
        assert_eq!(
            statement.summary.closing_balance,
            engine.bank_account(owner, bank.id).unwrap().current_balance()
        );
    }

    #[test]
    fn test_voided_entries_leave_the_statement() {
        let (engine, owner) = engine();
        let bank = engine
            .open_bank_account(owner, BankAccount::new(owner, "HDFC", "1234", Money::new(dec!(5000)), Utc::now()))
            .unwrap();
        let supplier = engine
            .register_supplier(owner, Supplier::new(owner, "Malabar Spices", Utc::now()))
            .unwrap();
        let payment = engine
            .create_payment_out(
                owner,
                NewPaymentOut::new(supplier.id, Money::new(dec!(900)), PaymentMethod::BankTransfer)
                    .from_bank(bank.id),
            )
            .unwrap();
        engine.cancel_payment_out(owner, payment.id, None).unwrap();

        let statement = engine
            .account_ledger(owner, &AccountRef::Bank(bank.id), DateRange::all(), None)
            .unwrap();

        assert!(statement.rows.is_empty());
        assert_eq!(statement.summary.closing_balance, Money::new(dec!(5000)));
        assert_eq!(engine.audit_trail(owner).unwrap().len(), 2);
    }

    #[test]
    fn test_external_category_has_no_statement() {
        let (engine, owner) = seeded();

        let result = engine.account_ledger(
            owner,
            &AccountRef::external("sundry").unwrap(),
            DateRange::all(),
            None,
        );

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_unknown_bank_is_not_found() {
        let (engine, owner) = engine();

        let result = engine.account_ledger(owner, &AccountRef::Bank(BankAccountId::new()), DateRange::all(), None);

        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }
}
