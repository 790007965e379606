//! Tests for the async ledger facade

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{BankAccountId, DateRange, Money, OwnerId};
use domain_ledger::{
    AccountRef, ErrorKind, NewPaymentIn, NewPaymentOut, PaymentMethod, PaymentStatus, ReceiptLine,
    TransferRequest,
};
use ledger_service::{LedgerService, ServiceError};
use test_utils::{init_test_tracing, ScenarioBuilder, TestScenario};

fn service(scenario: TestScenario) -> LedgerService {
    init_test_tracing();
    LedgerService::new(Arc::new(scenario.engine), Duration::from_secs(5))
}

// ============================================================================
// Payment tests
// ============================================================================

mod payment_tests {
    use super::*;

    #[tokio::test]
    async fn test_split_receipt_settles_invoice() {
        let scenario = ScenarioBuilder::new()
            .with_bank("hdfc", dec!(0))
            .with_customer("asha", dec!(0))
            .with_invoice("asha", "INV-1", dec!(1000))
            .build()
            .unwrap();
        let (owner, bank) = (scenario.owner, scenario.bank("hdfc"));
        let (customer, invoice) = (scenario.customer("asha"), scenario.invoice("INV-1"));
        let service = service(scenario);

        let receipt = service
            .create_payment_in(
                owner,
                NewPaymentIn::new(customer, AccountRef::Bank(bank))
                    .with_method(ReceiptLine::new(PaymentMethod::Cash, Money::new(dec!(600))))
                    .with_method(ReceiptLine::new(PaymentMethod::Upi, Money::new(dec!(400))))
                    .allocate(invoice, Money::new(dec!(1000))),
            )
            .await
            .unwrap();

        assert_eq!(receipt.total_amount, Money::new(dec!(1000)));
        assert!(receipt.excess_amount.is_zero());
        let invoice = service.engine().invoice(owner, invoice).unwrap();
        assert_eq!(invoice.payment_status, PaymentStatus::Paid);

        let summary = service.bank_summary(owner).await.unwrap();
        assert_eq!(summary.total_balance, Money::new(dec!(1000)));
        let info = service.customer_payment_info(owner, customer).await.unwrap();
        assert!(info.outstanding_due.is_zero());
    }

    #[tokio::test]
    async fn test_concurrent_full_settlements_commit_once() {
        let scenario = ScenarioBuilder::new()
            .with_bank("sbi", dec!(20000))
            .with_supplier("kaveri")
            .with_bill("kaveri", "B-1", dec!(8000))
            .build()
            .unwrap();
        let (owner, bank) = (scenario.owner, scenario.bank("sbi"));
        let (supplier, bill) = (scenario.supplier("kaveri"), scenario.bill("B-1"));
        let service = service(scenario);

        let request = || {
            NewPaymentOut::new(supplier, Money::new(dec!(8000)), PaymentMethod::BankTransfer)
                .from_bank(bank)
                .allocate(bill, Money::new(dec!(8000)))
        };
        let (first, second) = tokio::join!(
            service.create_payment_out(owner, request()),
            service.create_payment_out(owner, request()),
        );

        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let failure = first.err().or(second.err()).unwrap();
        assert!(matches!(
            failure.ledger_kind(),
            Some(ErrorKind::BusinessRule) | Some(ErrorKind::Concurrency)
        ));
        assert_eq!(
            service.engine().bank_account(owner, bank).unwrap().current_balance(),
            Money::new(dec!(12000))
        );
    }
}

// ============================================================================
// Cash and bank tests
// ============================================================================

mod cashbank_tests {
    use super::*;

    #[tokio::test]
    async fn test_transfer_shows_on_both_statements() {
        let scenario = ScenarioBuilder::new().with_bank("axis", dec!(5000)).build().unwrap();
        let (owner, bank) = (scenario.owner, scenario.bank("axis"));
        let service = service(scenario);

        service
            .create_transfer(
                owner,
                TransferRequest::new(AccountRef::Bank(bank), AccountRef::Cash, Money::new(dec!(1200)))
                    .with_description("Petty cash"),
            )
            .await
            .unwrap();

        let cash = service
            .account_ledger(owner, AccountRef::Cash, DateRange::all(), None)
            .await
            .unwrap();
        let statement = service
            .account_ledger(owner, AccountRef::Bank(bank), DateRange::all(), None)
            .await
            .unwrap();

        assert_eq!(cash.summary.closing_balance, Money::new(dec!(1200)));
        assert_eq!(statement.summary.closing_balance, Money::new(dec!(3800)));
        let position = service.cash_bank_position(owner).await.unwrap();
        assert_eq!(position.total_liquidity, Money::new(dec!(5000)));
    }

    #[tokio::test]
    async fn test_bulk_reconcile_counts_updates() {
        let scenario = ScenarioBuilder::new()
            .with_bank("hdfc", dec!(1000))
            .with_cash(dec!(300))
            .build()
            .unwrap();
        let (owner, bank) = (scenario.owner, scenario.bank("hdfc"));
        let service = service(scenario);

        let entry = service
            .create_transfer(
                owner,
                TransferRequest::new(AccountRef::Cash, AccountRef::Bank(bank), Money::new(dec!(300))),
            )
            .await
            .unwrap();

        let updated = service
            .bulk_reconcile(owner, vec![entry.id, core_kernel::LedgerEntryId::new()], true)
            .await
            .unwrap();

        assert_eq!(updated, 1);
        let rows = service
            .account_ledger(owner, AccountRef::Bank(bank), DateRange::all(), Some(true))
            .await
            .unwrap()
            .rows;
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_bank_maps_to_not_found() {
        let scenario = ScenarioBuilder::new().build().unwrap();
        let owner = scenario.owner;
        let service = service(scenario);

        let result = service
            .account_ledger(owner, AccountRef::Bank(BankAccountId::new()), DateRange::all(), None)
            .await;

        match result {
            Err(error @ ServiceError::Ledger(_)) => {
                assert_eq!(error.ledger_kind(), Some(ErrorKind::NotFound));
                assert!(!error.is_retryable());
            }
            other => panic!("expected a ledger error, got {:?}", other.map(|l| l.rows.len())),
        }
    }
}

// ============================================================================
// Audit tests
// ============================================================================

mod audit_tests {
    use super::*;

    #[tokio::test]
    async fn test_audit_all_covers_every_owner() {
        let scenario = ScenarioBuilder::new().with_bank("hdfc", dec!(100)).build().unwrap();
        let service = service(scenario);
        let other = OwnerId::new();
        service
            .create_cash_transaction(
                other,
                domain_ledger::CashTransactionRequest::new(
                    domain_ledger::CashDirection::In,
                    AccountRef::external("sales").unwrap(),
                    Money::new(dec!(50)),
                ),
            )
            .await
            .unwrap();

        let reports = service.audit_all().await.unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.is_clean()));
    }

    #[tokio::test]
    async fn test_audit_task_runs_until_aborted() {
        let scenario = ScenarioBuilder::new().with_cash(dec!(10)).build().unwrap();
        let service = Arc::new(service(scenario));

        let task = service.spawn_audit_task(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        task.abort();
        let joined = task.await;
        assert!(joined.unwrap_err().is_cancelled());
    }
}

// ============================================================================
// Storage failure tests
// ============================================================================

mod storage_failure_tests {
    use super::*;
    use chrono::Utc;
    use domain_ledger::{BankAccount, ChangeSet, ChangeSink, EngineConfig, LedgerEngine, LedgerError};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Refuses any change set that stores a bank account while `down` is set
    #[derive(Default)]
    struct AccountTableDown {
        down: AtomicBool,
    }

    impl ChangeSink for AccountTableDown {
        fn persist(&self, _operation: &'static str, changes: &ChangeSet) -> Result<(), LedgerError> {
            if self.down.load(Ordering::SeqCst) && !changes.bank_accounts.is_empty() {
                return Err(LedgerError::Persistence(
                    "insert into bank_accounts: connection reset".to_string(),
                ));
            }
            Ok(())
        }
    }

    fn service_with(sink: Arc<AccountTableDown>) -> LedgerService {
        init_test_tracing();
        let engine = LedgerEngine::new(EngineConfig::default()).with_sink(sink);
        LedgerService::new(Arc::new(engine), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_failed_account_insert_opens_nothing() {
        let sink = Arc::new(AccountTableDown::default());
        sink.down.store(true, Ordering::SeqCst);
        let service = service_with(sink.clone());
        let owner = OwnerId::new();

        let err = service
            .open_bank_account(
                owner,
                BankAccount::new(owner, "ICICI", "000401556677", Money::new(dec!(2500)), Utc::now()),
            )
            .await
            .unwrap_err();

        assert_eq!(err.ledger_kind(), Some(ErrorKind::Internal));
        assert!(err.is_retryable());
        let summary = service.bank_summary(owner).await.unwrap();
        assert!(summary.accounts.is_empty());
        assert!(summary.total_balance.is_zero());
        assert!(service.audit(owner).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_retry_succeeds_once_storage_recovers() {
        let sink = Arc::new(AccountTableDown::default());
        sink.down.store(true, Ordering::SeqCst);
        let service = service_with(sink.clone());
        let owner = OwnerId::new();
        let account = BankAccount::new(owner, "ICICI", "000401556677", Money::new(dec!(2500)), Utc::now());

        assert!(service.open_bank_account(owner, account.clone()).await.is_err());
        sink.down.store(false, Ordering::SeqCst);
        let opened = service.open_bank_account(owner, account).await.unwrap();
        service
            .create_transfer(
                owner,
                TransferRequest::new(AccountRef::Bank(opened.id), AccountRef::Cash, Money::new(dec!(1000))),
            )
            .await
            .unwrap();

        let summary = service.bank_summary(owner).await.unwrap();
        assert_eq!(summary.accounts.len(), 1);
        assert_eq!(summary.total_balance, Money::new(dec!(1500)));
        assert!(service.audit(owner).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_failed_transfer_keeps_both_balances() {
        let sink = Arc::new(AccountTableDown::default());
        let service = service_with(sink.clone());
        let owner = OwnerId::new();
        let opened = service
            .open_bank_account(
                owner,
                BankAccount::new(owner, "ICICI", "000401556677", Money::new(dec!(2500)), Utc::now()),
            )
            .await
            .unwrap();

        sink.down.store(true, Ordering::SeqCst);
        let result = service
            .create_transfer(
                owner,
                TransferRequest::new(AccountRef::Bank(opened.id), AccountRef::Cash, Money::new(dec!(1000))),
            )
            .await;

        assert!(matches!(result, Err(ServiceError::Ledger(LedgerError::Persistence(_)))));
        assert_eq!(service.engine().cash_balance(owner).unwrap(), Money::ZERO);
        assert_eq!(
            service.engine().bank_account(owner, opened.id).unwrap().current_balance(),
            Money::new(dec!(2500))
        );
        assert!(service.engine().audit_trail(owner).unwrap().is_empty());
    }
}
