//! Tests for transfers, cash transactions, liquidity position and reconciliation

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{LedgerEntryId, Money, OwnerId};

use domain_ledger::{
    AccountRef, BankAccount, BankAccountStatus, CashDirection, CashTransactionRequest, EngineConfig,
    EntryKind, ErrorKind, LedgerEngine, LedgerError, ManualClock, NewPaymentOut, PaymentMethod,
    Supplier, TransferRequest,
};

fn engine() -> (LedgerEngine, OwnerId) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap()));
    (LedgerEngine::with_clock(EngineConfig::default(), clock), OwnerId::new())
}

fn bank(engine: &LedgerEngine, owner: OwnerId, name: &str, opening: Money) -> BankAccount {
    engine
        .open_bank_account(owner, BankAccount::new(owner, name, "55012348890", opening, Utc::now()))
        .unwrap()
}

fn cash_in(engine: &LedgerEngine, owner: OwnerId, amount: Money) {
    engine
        .create_cash_transaction(
            owner,
            CashTransactionRequest::new(CashDirection::In, AccountRef::external("sales").unwrap(), amount),
        )
        .unwrap();
}

// ============================================================================
// Transfer tests
// ============================================================================

mod transfer_tests {
    use super::*;

    #[test]
    fn test_bank_to_cash_moves_both_sides() {
        let (engine, owner) = engine();
        let bank = bank(&engine, owner, "HDFC", Money::new(dec!(5000)));

        let entry = engine
            .create_transfer(
                owner,
                TransferRequest::new(AccountRef::Bank(bank.id), AccountRef::Cash, Money::new(dec!(2000)))
                    .with_description("Petty cash"),
            )
            .unwrap();

        assert_eq!(entry.kind, EntryKind::Transfer);
        assert_eq!(entry.description, "Petty cash");
        assert_eq!(engine.bank_account(owner, bank.id).unwrap().current_balance(), Money::new(dec!(3000)));
        assert_eq!(engine.cash_balance(owner).unwrap(), Money::new(dec!(2000)));
    }

    #[test]
    fn test_between_two_banks() {
        let (engine, owner) = engine();
        let hdfc = bank(&engine, owner, "HDFC", Money::new(dec!(5000)));
        let sbi = bank(&engine, owner, "SBI", Money::new(dec!(100)));

        engine
            .create_transfer(
                owner,
                TransferRequest::new(AccountRef::Bank(hdfc.id), AccountRef::Bank(sbi.id), Money::new(dec!(5000))),
            )
            .unwrap();

        assert_eq!(engine.bank_account(owner, hdfc.id).unwrap().current_balance(), Money::ZERO);
        assert_eq!(engine.bank_account(owner, sbi.id).unwrap().current_balance(), Money::new(dec!(5100)));
        assert!(engine.audit(owner).unwrap().is_clean());
    }

    #[test]
    fn test_same_account_is_rejected() {
        let (engine, owner) = engine();

        let result = engine.create_transfer(
            owner,
            TransferRequest::new(AccountRef::Cash, AccountRef::Cash, Money::new(dec!(10))),
        );

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_non_positive_amount_is_rejected() {
        let (engine, owner) = engine();
        let bank = bank(&engine, owner, "HDFC", Money::new(dec!(5000)));

        let result = engine.create_transfer(
            owner,
            TransferRequest::new(AccountRef::Bank(bank.id), AccountRef::Cash, Money::ZERO),
        );

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_external_side_is_rejected() {
        let (engine, owner) = engine();
        cash_in(&engine, owner, Money::new(dec!(100)));

        let result = engine.create_transfer(
            owner,
            TransferRequest::new(AccountRef::Cash, AccountRef::external("rent").unwrap(), Money::new(dec!(10))),
        );

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_unknown_or_foreign_bank_is_not_found() {
        let (engine, owner) = engine();
        let other_owner = OwnerId::new();
        let foreign = bank(&engine, other_owner, "HDFC", Money::new(dec!(5000)));

        let result = engine.create_transfer(
            owner,
            TransferRequest::new(AccountRef::Bank(foreign.id), AccountRef::Cash, Money::new(dec!(10))),
        );

        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            engine.bank_account(other_owner, foreign.id).unwrap().current_balance(),
            Money::new(dec!(5000))
        );
    }

    #[test]
    fn test_cash_shortfall_leaves_books_untouched() {
        let (engine, owner) = engine();
        let bank = bank(&engine, owner, "HDFC", Money::ZERO);
        cash_in(&engine, owner, Money::new(dec!(300)));

        let result = engine.create_transfer(
            owner,
            TransferRequest::new(AccountRef::Cash, AccountRef::Bank(bank.id), Money::new(dec!(500))),
        );

        match result {
            Err(LedgerError::InsufficientFunds { available, shortfall, .. }) => {
                assert_eq!(available, dec!(300));
                assert_eq!(shortfall, dec!(200));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
        assert_eq!(engine.cash_balance(owner).unwrap(), Money::new(dec!(300)));
        assert_eq!(engine.audit_trail(owner).unwrap().len(), 1);
    }
}

// ============================================================================
// Cash transaction tests
// ============================================================================

mod cash_transaction_tests {
    use super::*;

    #[test]
    fn test_cash_in_from_category() {
        let (engine, owner) = engine();

        let entry = engine
            .create_cash_transaction(
                owner,
                CashTransactionRequest::new(
                    CashDirection::In,
                    AccountRef::external("counter-sales").unwrap(),
                    Money::new(dec!(750)),
                )
                .with_reference("Z-REPORT-11"),
            )
            .unwrap();

        assert_eq!(entry.kind, EntryKind::In);
        assert_eq!(entry.to, AccountRef::Cash);
        assert_eq!(entry.reference.as_deref(), Some("Z-REPORT-11"));
        assert_eq!(engine.cash_balance(owner).unwrap(), Money::new(dec!(750)));
    }

    #[test]
    fn test_cash_out_to_category_needs_cash() {
        let (engine, owner) = engine();
        cash_in(&engine, owner, Money::new(dec!(400)));
        let rent = AccountRef::external("rent").unwrap();

        let short = engine.create_cash_transaction(
            owner,
            CashTransactionRequest::new(CashDirection::Out, rent.clone(), Money::new(dec!(401))),
        );
        assert!(matches!(short, Err(LedgerError::InsufficientFunds { .. })));

        let entry = engine
            .create_cash_transaction(
                owner,
                CashTransactionRequest::new(CashDirection::Out, rent, Money::new(dec!(400))),
            )
            .unwrap();
        assert_eq!(entry.kind, EntryKind::Out);
        assert_eq!(engine.cash_balance(owner).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_cash_against_bank_is_a_transfer() {
        let (engine, owner) = engine();
        let bank = bank(&engine, owner, "Axis", Money::new(dec!(1000)));

        let withdrawal = engine
            .create_cash_transaction(
                owner,
                CashTransactionRequest::new(CashDirection::In, AccountRef::Bank(bank.id), Money::new(dec!(600))),
            )
            .unwrap();
        assert_eq!(withdrawal.kind, EntryKind::Transfer);
        assert_eq!(engine.bank_account(owner, bank.id).unwrap().current_balance(), Money::new(dec!(400)));

        let overdraw = engine.create_cash_transaction(
            owner,
            CashTransactionRequest::new(CashDirection::In, AccountRef::Bank(bank.id), Money::new(dec!(401))),
        );
        assert!(matches!(overdraw, Err(LedgerError::InsufficientFunds { .. })));

        engine
            .create_cash_transaction(
                owner,
                CashTransactionRequest::new(CashDirection::Out, AccountRef::Bank(bank.id), Money::new(dec!(600))),
            )
            .unwrap();
        assert_eq!(engine.bank_account(owner, bank.id).unwrap().current_balance(), Money::new(dec!(1000)));
        assert_eq!(engine.cash_balance(owner).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_other_side_cannot_be_cash() {
        let (engine, owner) = engine();

        let result = engine.create_cash_transaction(
            owner,
            CashTransactionRequest::new(CashDirection::In, AccountRef::Cash, Money::new(dec!(10))),
        );

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}

// ============================================================================
// Position and summary tests
// ============================================================================

mod position_tests {
    use super::*;

    #[test]
    fn test_position_splits_liquidity() {
        let (engine, owner) = engine();
        bank(&engine, owner, "HDFC", Money::new(dec!(5000)));
        bank(&engine, owner, "SBI", Money::new(dec!(2500)));
        let dormant = bank(&engine, owner, "Yes Bank", Money::new(dec!(9999)));
        engine
            .set_bank_account_status(owner, dormant.id, BankAccountStatus::Inactive)
            .unwrap();
        cash_in(&engine, owner, Money::new(dec!(2500)));

        let position = engine.cash_bank_position(owner).unwrap();

        assert_eq!(position.cash_in_hand, Money::new(dec!(2500)));
        assert_eq!(position.total_bank_balance, Money::new(dec!(7500)));
        assert_eq!(position.total_liquidity, Money::new(dec!(10000)));
        assert_eq!(position.breakdown.cash.percentage, dec!(25.00));
        assert_eq!(position.breakdown.bank.percentage, dec!(75.00));
        assert_eq!(position.breakdown.bank.accounts, 2);
    }

    #[test]
    fn test_empty_books_have_zero_percentages() {
        let (engine, owner) = engine();

        let position = engine.cash_bank_position(owner).unwrap();

        assert_eq!(position.total_liquidity, Money::ZERO);
        assert_eq!(position.breakdown.cash.percentage, dec!(0));
        assert_eq!(position.breakdown.bank.percentage, dec!(0));
    }

    #[test]
    fn test_bank_summary_lists_by_name() {
        let (engine, owner) = engine();
        bank(&engine, owner, "SBI", Money::new(dec!(200)));
        let inactive = bank(&engine, owner, "Axis", Money::new(dec!(50)));
        bank(&engine, owner, "HDFC", Money::new(dec!(100)));
        engine
            .set_bank_account_status(owner, inactive.id, BankAccountStatus::Inactive)
            .unwrap();
        bank(&engine, OwnerId::new(), "Canara", Money::new(dec!(1)));

        let summary = engine.bank_summary(owner).unwrap();

        let names: Vec<&str> = summary.accounts.iter().map(|a| a.bank_name.as_str()).collect();
        assert_eq!(names, vec!["Axis", "HDFC", "SBI"]);
        assert_eq!(summary.account_count, 3);
        assert_eq!(summary.total_balance, Money::new(dec!(300)));
    }
}

// ============================================================================
// Reconciliation and account lifecycle tests
// ============================================================================

mod reconciliation_tests {
    use super::*;

    #[test]
    fn test_toggle_flips_the_flag() {
        let (engine, owner) = engine();
        cash_in(&engine, owner, Money::new(dec!(100)));
        let id = engine.audit_trail(owner).unwrap()[0].id;

        let on = engine.toggle_reconciliation(owner, id).unwrap();
        assert!(on.reconciled);
        assert!(on.reconciled_at.is_some());

        let off = engine.toggle_reconciliation(owner, id).unwrap();
        assert!(!off.reconciled);
        assert!(off.reconciled_at.is_none());
    }

    #[test]
    fn test_toggle_unknown_entry_is_not_found() {
        let (engine, owner) = engine();

        let result = engine.toggle_reconciliation(owner, LedgerEntryId::new());

        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[test]
    fn test_bulk_reconcile_skips_ineligible_ids() {
        let (engine, owner) = engine();
        let bank = bank(&engine, owner, "HDFC", Money::new(dec!(5000)));
        let supplier = engine
            .register_supplier(owner, Supplier::new(owner, "Nilgiri Traders", Utc::now()))
            .unwrap();
        cash_in(&engine, owner, Money::new(dec!(100)));
        let kept = engine.audit_trail(owner).unwrap()[0].id;
        let payment = engine
            .create_payment_out(
                owner,
                NewPaymentOut::new(supplier.id, Money::new(dec!(100)), PaymentMethod::Upi).from_bank(bank.id),
            )
            .unwrap();
        engine.cancel_payment_out(owner, payment.id, None).unwrap();
        let voided = payment.ledger_entry.unwrap();

        let other_owner = OwnerId::new();
        cash_in(&engine, other_owner, Money::new(dec!(5)));
        let foreign = engine.audit_trail(other_owner).unwrap()[0].id;

        let updated = engine
            .bulk_reconcile(owner, &[kept, voided, foreign, LedgerEntryId::new()], true)
            .unwrap();

        assert_eq!(updated, 1);
        let trail = engine.audit_trail(owner).unwrap();
        assert!(trail.iter().find(|e| e.id == kept).unwrap().reconciled);
        assert!(!trail.iter().find(|e| e.id == voided).unwrap().reconciled);
        assert!(!engine.audit_trail(other_owner).unwrap()[0].reconciled);
    }

    #[test]
    fn test_inactive_account_takes_no_new_movements() {
        let (engine, owner) = engine();
        let active = bank(&engine, owner, "HDFC", Money::new(dec!(5000)));
        let dormant = bank(&engine, owner, "Yes Bank", Money::new(dec!(800)));
        let supplier = engine
            .register_supplier(owner, Supplier::new(owner, "Nilgiri Traders", Utc::now()))
            .unwrap();
        cash_in(&engine, owner, Money::new(dec!(300)));
        engine
            .set_bank_account_status(owner, dormant.id, BankAccountStatus::Inactive)
            .unwrap();
        let before = engine.cash_bank_position(owner).unwrap();

        let into_dormant = engine.create_transfer(
            owner,
            TransferRequest::new(AccountRef::Bank(active.id), AccountRef::Bank(dormant.id), Money::new(dec!(100))),
        );
        let out_of_dormant = engine.create_transfer(
            owner,
            TransferRequest::new(AccountRef::Bank(dormant.id), AccountRef::Cash, Money::new(dec!(100))),
        );
        let cash_deposit = engine.create_cash_transaction(
            owner,
            CashTransactionRequest::new(CashDirection::Out, AccountRef::Bank(dormant.id), Money::new(dec!(50))),
        );
        let supplier_payment = engine.create_payment_out(
            owner,
            NewPaymentOut::new(supplier.id, Money::new(dec!(10)), PaymentMethod::Upi).from_bank(dormant.id),
        );

        for result in [into_dormant.map(|_| ()), out_of_dormant.map(|_| ()), cash_deposit.map(|_| ())] {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        }
        assert_eq!(supplier_payment.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(engine.cash_bank_position(owner).unwrap(), before);
        assert_eq!(
            engine.bank_account(owner, dormant.id).unwrap().current_balance(),
            Money::new(dec!(800))
        );
    }

    #[test]
    fn test_payment_can_be_cancelled_after_its_account_is_deactivated() {
        let (engine, owner) = engine();
        let account = bank(&engine, owner, "HDFC", Money::new(dec!(5000)));
        let supplier = engine
            .register_supplier(owner, Supplier::new(owner, "Nilgiri Traders", Utc::now()))
            .unwrap();
        let payment = engine
            .create_payment_out(
                owner,
                NewPaymentOut::new(supplier.id, Money::new(dec!(400)), PaymentMethod::BankTransfer)
                    .from_bank(account.id),
            )
            .unwrap();
        engine
            .set_bank_account_status(owner, account.id, BankAccountStatus::Inactive)
            .unwrap();

        engine.cancel_payment_out(owner, payment.id, None).unwrap();

        assert_eq!(
            engine.bank_account(owner, account.id).unwrap().current_balance(),
            Money::new(dec!(5000))
        );
    }

    #[test]
    fn test_close_account_in_use_is_refused() {
        let (engine, owner) = engine();
        let used = bank(&engine, owner, "HDFC", Money::new(dec!(5000)));
        let idle = bank(&engine, owner, "SBI", Money::new(dec!(10)));
        engine
            .create_transfer(
                owner,
                TransferRequest::new(AccountRef::Bank(used.id), AccountRef::Cash, Money::new(dec!(1))),
            )
            .unwrap();

        let refused = engine.close_bank_account(owner, used.id);
        assert!(matches!(refused, Err(LedgerError::AccountInUse(_))));

        let closed = engine.close_bank_account(owner, idle.id).unwrap();
        assert_eq!(closed.id, idle.id);
        assert!(matches!(
            engine.bank_account(owner, idle.id),
            Err(LedgerError::NotFound { .. })
        ));
    }
}
