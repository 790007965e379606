//! Tests for customer receipts

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{Money, OwnerId};

use domain_ledger::{
    AccountRef, ActivityMethod, BankAccount, Customer, EngineConfig, EntryKind, Invoice,
    LedgerEngine, LedgerError, ManualClock, NewPaymentIn, PaymentMethod, PaymentStatus,
    ReceiptLine,
};

fn engine() -> (LedgerEngine, OwnerId) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap()));
    (LedgerEngine::with_clock(EngineConfig::default(), clock), OwnerId::new())
}

fn customer(engine: &LedgerEngine, owner: OwnerId, dues: Money) -> Customer {
    let customer = Customer::new(owner, "Anita Traders", Utc::now()).with_opening_dues(dues);
    engine.register_customer(owner, customer).unwrap()
}

fn invoice(engine: &LedgerEngine, owner: OwnerId, customer: &Customer, no: &str, total: Money) -> Invoice {
    engine
        .record_invoice(owner, Invoice::new(owner, customer.id, no, total, Utc::now()))
        .unwrap()
}

fn bank(engine: &LedgerEngine, owner: OwnerId, opening: Money) -> BankAccount {
    engine
        .open_bank_account(owner, BankAccount::new(owner, "HDFC", "50100012345678", opening, Utc::now()))
        .unwrap()
}

// ============================================================================
// Scenario tests
// ============================================================================

mod scenario_tests {
    use super::*;

    #[test]
    fn test_split_payment_settles_invoice_into_bank() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);
        let invoice = invoice(&engine, owner, &customer, "INV-001", Money::new(dec!(1000)));
        let bank = bank(&engine, owner, Money::new(dec!(5000)));

        let payment = engine
            .create_payment_in(
                owner,
                NewPaymentIn::new(customer.id, AccountRef::Bank(bank.id))
                    .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(600))))
                    .with_method(ReceiptLine::new(PaymentMethod::Upi, Money::new(dec!(400))))
                    .allocate(invoice.id, Money::new(dec!(1000))),
            )
            .unwrap();

        assert_eq!(payment.receipt_number, "RCP-20240310-0001");
        assert_eq!(payment.total_amount, Money::new(dec!(1000)));
        assert_eq!(payment.excess_amount, Money::ZERO);
        assert_eq!(engine.invoice(owner, invoice.id).unwrap().payment_status, PaymentStatus::Paid);
        assert_eq!(engine.customer(owner, customer.id).unwrap().dues(), Money::ZERO);
        assert_eq!(
            engine.bank_account(owner, bank.id).unwrap().current_balance(),
            Money::new(dec!(6000))
        );

        let trail = engine.audit_trail(owner).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, EntryKind::In);
        assert_eq!(trail[0].to, AccountRef::Bank(bank.id));
        assert_eq!(trail[0].reference.as_deref(), Some("RCP-20240310-0001"));
    }

    #[test]
    fn test_overpayment_becomes_customer_credit() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);
        let invoice = invoice(&engine, owner, &customer, "INV-002", Money::new(dec!(1000)));

        let payment = engine
            .create_payment_in(
                owner,
                NewPaymentIn::new(customer.id, AccountRef::Cash)
                    .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(1500))))
                    .allocate(invoice.id, Money::new(dec!(1000))),
            )
            .unwrap();

        assert_eq!(payment.total_allocated(), Money::new(dec!(1000)));
        assert_eq!(payment.excess_amount, Money::new(dec!(500)));
        let customer = engine.customer(owner, customer.id).unwrap();
        assert_eq!(customer.dues(), Money::new(dec!(-500)));
        assert_eq!(customer.available_credit(), Money::new(dec!(500)));
        assert_eq!(engine.cash_balance(owner).unwrap(), Money::new(dec!(1500)));
    }

    #[test]
    fn test_activity_lines_describe_the_split() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::new(dec!(-200)));
        let invoice = invoice(&engine, owner, &customer, "INV-003", Money::new(dec!(1000)));

        // Invoice brought dues to 800, so no credit is left to draw on.
        let payment = engine
            .create_payment_in(
                owner,
                NewPaymentIn::new(customer.id, AccountRef::Cash)
                    .with_method(ReceiptLine::new(PaymentMethod::BankTransfer, Money::new(dec!(1200))))
                    .allocate(invoice.id, Money::new(dec!(1000))),
            )
            .unwrap();

        let activity = engine.customer_activity(owner, customer.id).unwrap();
        assert_eq!(activity.len(), 2);
        // newest first
        assert_eq!(activity[0].method, ActivityMethod::Credit);
        assert_eq!(activity[0].amount, Money::new(dec!(-200)));
        assert_eq!(
            activity[0].description,
            format!("Excess payment - Customer credit created - Receipt {}", payment.receipt_number)
        );
        assert_eq!(activity[1].method, ActivityMethod::Bank);
        assert_eq!(activity[1].amount, Money::new(dec!(1000)));
    }
}

// ============================================================================
// Validation tests
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_credit_above_available_is_rejected_without_mutation() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::new(dec!(-1300)));
        let invoice = invoice(&engine, owner, &customer, "INV-010", Money::new(dec!(1000)));
        // Available credit is now 300.

        let result = engine.create_payment_in(
            owner,
            NewPaymentIn::new(customer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(100))))
                .with_credit(Money::new(dec!(400)))
                .allocate(invoice.id, Money::new(dec!(500))),
        );

        assert!(matches!(result, Err(LedgerError::CreditExceedsAvailable { .. })));
        assert_eq!(engine.customer(owner, customer.id).unwrap().dues(), Money::new(dec!(-300)));
        assert_eq!(engine.invoice(owner, invoice.id).unwrap().paid_amount, Money::ZERO);
        assert!(engine.audit_trail(owner).unwrap().is_empty());
        assert!(engine.customer_activity(owner, customer.id).unwrap().is_empty());
    }

    #[test]
    fn test_credit_within_available_is_consumed() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::new(dec!(-1300)));
        let invoice = invoice(&engine, owner, &customer, "INV-011", Money::new(dec!(1000)));

        let payment = engine
            .create_payment_in(
                owner,
                NewPaymentIn::new(customer.id, AccountRef::Cash)
                    .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(700))))
                    .with_credit(Money::new(dec!(300)))
                    .allocate(invoice.id, Money::new(dec!(1000))),
            )
            .unwrap();

        assert_eq!(payment.excess_amount, Money::ZERO);
        // dues move by credit - allocated - excess
        assert_eq!(engine.customer(owner, customer.id).unwrap().dues(), Money::new(dec!(-1000)));
        // only tendered money reaches the ledger
        assert_eq!(engine.cash_balance(owner).unwrap(), Money::new(dec!(700)));
    }

    #[test]
    fn test_allocation_above_invoice_balance_is_rejected() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);
        let invoice = invoice(&engine, owner, &customer, "INV-012", Money::new(dec!(1000)));

        // Two lines against the same invoice are summed before the check.
        let result = engine.create_payment_in(
            owner,
            NewPaymentIn::new(customer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(1200))))
                .allocate(invoice.id, Money::new(dec!(600)))
                .allocate(invoice.id, Money::new(dec!(600))),
        );

        match result {
            Err(LedgerError::AllocationExceedsBalance { document, balance, requested }) => {
                assert_eq!(document, "INV-012");
                assert_eq!(balance, dec!(1000));
                assert_eq!(requested, dec!(1200));
            }
            other => panic!("expected AllocationExceedsBalance, got {:?}", other),
        }
    }

    #[test]
    fn test_allocation_above_payment_is_over_allocation() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);
        let invoice = invoice(&engine, owner, &customer, "INV-013", Money::new(dec!(1000)));

        let result = engine.create_payment_in(
            owner,
            NewPaymentIn::new(customer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(400))))
                .allocate(invoice.id, Money::new(dec!(500))),
        );

        assert!(matches!(result, Err(LedgerError::OverAllocation { .. })));
        assert_eq!(engine.invoice(owner, invoice.id).unwrap().payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_requires_a_method() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);

        let result = engine.create_payment_in(owner, NewPaymentIn::new(customer.id, AccountRef::Cash));

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_rejects_zero_method_amount() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);

        let result = engine.create_payment_in(
            owner,
            NewPaymentIn::new(customer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Upi, Money::ZERO)),
        );

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_external_deposit_account_is_rejected() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);

        let result = engine.create_payment_in(
            owner,
            NewPaymentIn::new(customer.id, AccountRef::external("sale").unwrap())
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(10)))),
        );

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_invoice_of_another_customer_is_not_found() {
        let (engine, owner) = engine();
        let payer = customer(&engine, owner, Money::ZERO);
        let other = customer(&engine, owner, Money::ZERO);
        let foreign = invoice(&engine, owner, &other, "INV-014", Money::new(dec!(100)));

        let result = engine.create_payment_in(
            owner,
            NewPaymentIn::new(payer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(100))))
                .allocate(foreign.id, Money::new(dec!(100))),
        );

        assert!(matches!(result, Err(LedgerError::NotFound { entity: "Invoice", .. })));
    }

    #[test]
    fn test_other_owner_cannot_pay_into_customer() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);

        let result = engine.create_payment_in(
            OwnerId::new(),
            NewPaymentIn::new(customer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(100)))),
        );

        assert!(matches!(result, Err(LedgerError::NotFound { entity: "Customer", .. })));
    }

    #[test]
    fn test_stale_invoice_version_conflicts() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);
        let invoice = invoice(&engine, owner, &customer, "INV-015", Money::new(dec!(1000)));

        engine
            .create_payment_in(
                owner,
                NewPaymentIn::new(customer.id, AccountRef::Cash)
                    .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(100))))
                    .allocate(invoice.id, Money::new(dec!(100))),
            )
            .unwrap();

        let result = engine.create_payment_in(
            owner,
            NewPaymentIn::new(customer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(100))))
                .allocate_at_version(invoice.id, Money::new(dec!(100)), invoice.version),
        );

        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, LedgerError::ConcurrencyConflict { entity: "Invoice", .. }));
    }
}

// ============================================================================
// Numbering tests
// ============================================================================

mod numbering_tests {
    use super::*;

    #[test]
    fn test_receipt_numbers_increase_per_day() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let payment = engine
                .create_payment_in(
                    owner,
                    NewPaymentIn::new(customer.id, AccountRef::Cash)
                        .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(10)))),
                )
                .unwrap();
            numbers.push(payment.receipt_number);
        }

        assert_eq!(
            numbers,
            vec!["RCP-20240310-0001", "RCP-20240310-0002", "RCP-20240310-0003"]
        );
    }

    #[test]
    fn test_failed_payment_does_not_consume_a_number() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);
        let invoice = invoice(&engine, owner, &customer, "INV-020", Money::new(dec!(50)));

        let failed = engine.create_payment_in(
            owner,
            NewPaymentIn::new(customer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(10))))
                .allocate(invoice.id, Money::new(dec!(60))),
        );
        assert!(failed.is_err());

        let payment = engine
            .create_payment_in(
                owner,
                NewPaymentIn::new(customer.id, AccountRef::Cash)
                    .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(10)))),
            )
            .unwrap();
        assert_eq!(payment.receipt_number, "RCP-20240310-0001");
    }

    #[test]
    fn test_receipt_date_follows_business_timezone() {
        let (engine, owner) = engine();
        let customer = customer(&engine, owner, Money::ZERO);
        // 20:00 UTC on the 10th is already the 11th in Kolkata
        let late = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();

        let payment = engine
            .create_payment_in(
                owner,
                NewPaymentIn::new(customer.id, AccountRef::Cash)
                    .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(10))))
                    .on_date(late),
            )
            .unwrap();

        assert_eq!(payment.receipt_number, "RCP-20240311-0001");
    }
}

// ============================================================================
// Property tests
// ============================================================================

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn receipt_accounting_identity_holds(
            tendered in 1i64..500_000,
            invoice_total in 1i64..500_000,
            allocate_pct in 0u32..=100,
        ) {
            let (engine, owner) = engine();
            let customer = customer(&engine, owner, Money::ZERO);
            let total = Money::from_minor(invoice_total);
            let inv = invoice(&engine, owner, &customer, "INV-P", total);

            let cap = tendered.min(invoice_total);
            let allocated = Money::from_minor(cap * i64::from(allocate_pct) / 100);
            let mut request = NewPaymentIn::new(customer.id, AccountRef::Cash)
                .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::from_minor(tendered)));
            if allocated.is_positive() {
                request = request.allocate(inv.id, allocated);
            }

            let dues_before = engine.customer(owner, customer.id).unwrap().dues();
            let payment = engine.create_payment_in(owner, request).unwrap();
            let dues_after = engine.customer(owner, customer.id).unwrap().dues();

            prop_assert_eq!(
                payment.total_allocated() + payment.excess_amount,
                payment.total_amount + payment.credit_applied
            );
            prop_assert_eq!(
                dues_after - dues_before,
                payment.credit_applied - payment.total_allocated() - payment.excess_amount
            );
            prop_assert_eq!(engine.cash_balance(owner).unwrap(), payment.total_amount);
            prop_assert!(engine.audit(owner).unwrap().is_clean());
        }
    }
}
