//! Async facade over the ledger engine
//!
//! The engine is synchronous and lock-based, so every call runs on the
//! blocking pool. Reads are bounded by the configured query timeout. Writes
//! are never cut short.
//!
//! With a database attached the engine stores each call's changes before
//! committing them in memory. A failed store fails the call and leaves the
//! books as they were, so memory and database never diverge.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use core_kernel::{
    BankAccountId, BillId, CustomerId, DateRange, LedgerEntryId, Money, OwnerId, PaymentOutId,
    SupplierId,
};
use domain_ledger::reports::{
    CustomerPaymentInfo, DailyRegister, MethodBreakdown, SupplierPaymentInfo, SupplierPaymentSummary,
    UnappliedAdvances,
};
use domain_ledger::{
    AccountLedger, AccountRef, BankAccount, BankAccountStatus, BankSummary, Bill, CashBankPosition,
    CashTransactionRequest, ChequeOutcome, Customer, DriftReport, EngineConfig, Invoice, LedgerEngine,
    LedgerEntry, LedgerError, NewPaymentIn, NewPaymentOut, PaymentIn, PaymentOut, Supplier,
    SystemClock, TransferRequest,
};
use infra_db::{create_pool_from_url, load_books, run_migrations, DatabasePool};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::persistence::WriteThrough;

/// Shared, cloneable handle to the books
pub struct LedgerService {
    engine: Arc<LedgerEngine>,
    query_timeout: Duration,
    persistent: bool,
}

impl LedgerService {
    /// Wraps an existing engine with no database attached
    pub fn new(engine: Arc<LedgerEngine>, query_timeout: Duration) -> Self {
        Self { engine, query_timeout, persistent: false }
    }

    /// Fresh in-memory books on the system clock
    pub fn in_memory(config: &ServiceConfig) -> Self {
        Self::new(Arc::new(LedgerEngine::new(config.engine_config())), config.query_timeout())
    }

    /// Wraps `engine` so every write is stored in `pool` before it commits
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Runtime` when called outside a tokio runtime
    pub fn persistent(engine: LedgerEngine, pool: DatabasePool, query_timeout: Duration) -> Result<Self, ServiceError> {
        let sink = WriteThrough::new(pool, Handle::try_current()?);
        Ok(Self {
            engine: Arc::new(engine.with_sink(Arc::new(sink))),
            query_timeout,
            persistent: true,
        })
    }

    /// Builds the service described by `config`
    ///
    /// With a `database_url` the schema is migrated and the books are
    /// restored from it; without one the books start empty in memory.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Database` if the database cannot be reached,
    /// migrated, or read back
    pub async fn connect(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let Some(url) = config.database_url.as_deref() else {
            info!("no database configured, books are in memory only");
            return Ok(Self::in_memory(config));
        };

        let pool = create_pool_from_url(url).await?;
        run_migrations(&pool).await?;
        let books = load_books(&pool).await?;
        let engine = LedgerEngine::from_books(books, config.engine_config(), Arc::new(SystemClock));

        Self::persistent(engine, pool, config.query_timeout())
    }

    pub fn engine(&self) -> &Arc<LedgerEngine> {
        &self.engine
    }

    pub fn engine_config(&self) -> &EngineConfig {
        self.engine.config()
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub async fn open_bank_account(&self, owner: OwnerId, account: BankAccount) -> Result<BankAccount, ServiceError> {
        self.command("open_bank_account", move |e| e.open_bank_account(owner, account))
            .await
    }

    pub async fn close_bank_account(&self, owner: OwnerId, id: BankAccountId) -> Result<BankAccount, ServiceError> {
        self.command("close_bank_account", move |e| e.close_bank_account(owner, id))
            .await
    }

    pub async fn set_bank_account_status(
        &self,
        owner: OwnerId,
        id: BankAccountId,
        status: BankAccountStatus,
    ) -> Result<BankAccount, ServiceError> {
        self.command("set_bank_account_status", move |e| e.set_bank_account_status(owner, id, status))
            .await
    }

    pub async fn register_customer(&self, owner: OwnerId, customer: Customer) -> Result<Customer, ServiceError> {
        self.command("register_customer", move |e| e.register_customer(owner, customer))
            .await
    }

    pub async fn register_supplier(&self, owner: OwnerId, supplier: Supplier) -> Result<Supplier, ServiceError> {
        self.command("register_supplier", move |e| e.register_supplier(owner, supplier))
            .await
    }

    pub async fn record_invoice(&self, owner: OwnerId, invoice: Invoice) -> Result<Invoice, ServiceError> {
        self.command("record_invoice", move |e| e.record_invoice(owner, invoice))
            .await
    }

    pub async fn record_bill(&self, owner: OwnerId, bill: Bill) -> Result<Bill, ServiceError> {
        self.command("record_bill", move |e| e.record_bill(owner, bill)).await
    }

    // ------------------------------------------------------------------
    // Payments and transfers
    // ------------------------------------------------------------------

    pub async fn create_payment_in(&self, owner: OwnerId, request: NewPaymentIn) -> Result<PaymentIn, ServiceError> {
        self.command("create_payment_in", move |e| e.create_payment_in(owner, request))
            .await
    }

    pub async fn create_payment_out(&self, owner: OwnerId, request: NewPaymentOut) -> Result<PaymentOut, ServiceError> {
        self.command("create_payment_out", move |e| e.create_payment_out(owner, request))
            .await
    }

    pub async fn cancel_payment_out(
        &self,
        owner: OwnerId,
        id: PaymentOutId,
        reason: Option<String>,
    ) -> Result<PaymentOut, ServiceError> {
        self.command("cancel_payment_out", move |e| e.cancel_payment_out(owner, id, reason))
            .await
    }

    pub async fn set_cheque_status(
        &self,
        owner: OwnerId,
        id: PaymentOutId,
        outcome: ChequeOutcome,
        reason: Option<String>,
    ) -> Result<PaymentOut, ServiceError> {
        self.command("set_cheque_status", move |e| e.set_cheque_status(owner, id, outcome, reason))
            .await
    }

    pub async fn apply_supplier_advance(
        &self,
        owner: OwnerId,
        supplier: SupplierId,
        bill: BillId,
        amount: Money,
    ) -> Result<Bill, ServiceError> {
        self.command("apply_supplier_advance", move |e| {
            e.apply_supplier_advance(owner, supplier, bill, amount)
        })
        .await
    }

    pub async fn create_transfer(&self, owner: OwnerId, request: TransferRequest) -> Result<LedgerEntry, ServiceError> {
        self.command("create_transfer", move |e| e.create_transfer(owner, request))
            .await
    }

    pub async fn create_cash_transaction(
        &self,
        owner: OwnerId,
        request: CashTransactionRequest,
    ) -> Result<LedgerEntry, ServiceError> {
        self.command("create_cash_transaction", move |e| e.create_cash_transaction(owner, request))
            .await
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    pub async fn toggle_reconciliation(&self, owner: OwnerId, id: LedgerEntryId) -> Result<LedgerEntry, ServiceError> {
        self.command("toggle_reconciliation", move |e| e.toggle_reconciliation(owner, id))
            .await
    }

    /// Sets the reconciled flag on every eligible entry, returning how many changed
    pub async fn bulk_reconcile(
        &self,
        owner: OwnerId,
        ids: Vec<LedgerEntryId>,
        reconciled: bool,
    ) -> Result<usize, ServiceError> {
        self.command("bulk_reconcile", move |e| e.bulk_reconcile(owner, &ids, reconciled))
            .await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn account_ledger(
        &self,
        owner: OwnerId,
        account: AccountRef,
        range: DateRange,
        reconciled: Option<bool>,
    ) -> Result<AccountLedger, ServiceError> {
        self.query("account_ledger", move |e| e.account_ledger(owner, &account, range, reconciled))
            .await
    }

    pub async fn cash_balance(&self, owner: OwnerId) -> Result<Money, ServiceError> {
        self.query("cash_balance", move |e| e.cash_balance(owner)).await
    }

    pub async fn cash_bank_position(&self, owner: OwnerId) -> Result<CashBankPosition, ServiceError> {
        self.query("cash_bank_position", move |e| e.cash_bank_position(owner))
            .await
    }

    pub async fn bank_summary(&self, owner: OwnerId) -> Result<BankSummary, ServiceError> {
        self.query("bank_summary", move |e| e.bank_summary(owner)).await
    }

    pub async fn pending_cheques(&self, owner: OwnerId) -> Result<Vec<PaymentOut>, ServiceError> {
        self.query("pending_cheques", move |e| e.pending_cheques(owner)).await
    }

    pub async fn customer_payment_info(
        &self,
        owner: OwnerId,
        customer: CustomerId,
    ) -> Result<CustomerPaymentInfo, ServiceError> {
        self.query("customer_payment_info", move |e| e.customer_payment_info(owner, customer))
            .await
    }

    pub async fn supplier_payment_info(
        &self,
        owner: OwnerId,
        supplier: SupplierId,
    ) -> Result<SupplierPaymentInfo, ServiceError> {
        self.query("supplier_payment_info", move |e| e.supplier_payment_info(owner, supplier))
            .await
    }

    pub async fn supplier_summary(
        &self,
        owner: OwnerId,
        range: DateRange,
    ) -> Result<Vec<SupplierPaymentSummary>, ServiceError> {
        self.query("supplier_summary", move |e| e.supplier_summary(owner, range))
            .await
    }

    pub async fn method_breakdown(&self, owner: OwnerId, range: DateRange) -> Result<Vec<MethodBreakdown>, ServiceError> {
        self.query("method_breakdown", move |e| e.method_breakdown(owner, range))
            .await
    }

    pub async fn date_wise_register(&self, owner: OwnerId, range: DateRange) -> Result<Vec<DailyRegister>, ServiceError> {
        self.query("date_wise_register", move |e| e.date_wise_register(owner, range))
            .await
    }

    pub async fn unapplied_advances(&self, owner: OwnerId) -> Result<UnappliedAdvances, ServiceError> {
        self.query("unapplied_advances", move |e| e.unapplied_advances(owner))
            .await
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    pub async fn audit(&self, owner: OwnerId) -> Result<DriftReport, ServiceError> {
        self.query("audit", move |e| e.audit(owner)).await
    }

    /// Audits every owner on the books
    pub async fn audit_all(&self) -> Result<Vec<DriftReport>, ServiceError> {
        self.query("audit_all", |e| {
            e.owners()?.into_iter().map(|owner| e.audit(owner)).collect()
        })
        .await
    }

    /// Runs [`Self::audit_all`] every `every` until the handle is aborted
    ///
    /// Drift is reported, never repaired.
    pub fn spawn_audit_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match service.audit_all().await {
                    Ok(reports) => {
                        let drifting = reports.iter().filter(|r| !r.is_clean()).count();
                        if drifting > 0 {
                            warn!(owners = reports.len(), drifting, "audit pass found drift");
                        } else {
                            debug!(owners = reports.len(), "audit pass clean");
                        }
                    }
                    Err(error) => warn!(%error, "audit pass failed"),
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    /// Runs a read on the blocking pool, bounded by the query timeout
    async fn query<T, F>(&self, operation: &'static str, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&LedgerEngine) -> Result<T, LedgerError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let task = tokio::task::spawn_blocking(move || f(&engine));
        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => {
                let timeout_ms = u64::try_from(self.query_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(operation, timeout_ms, "query timed out");
                Err(ServiceError::Timeout { operation, timeout_ms })
            }
        }
    }

    /// Runs a write on the blocking pool
    ///
    /// Never bounded by the query timeout: an abandoned task would still
    /// commit after the caller was told it failed.
    async fn command<T, F>(&self, operation: &'static str, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&LedgerEngine) -> Result<T, LedgerError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let value = tokio::task::spawn_blocking(move || f(&engine)).await?;
        if let Err(error) = &value {
            debug!(operation, %error, "command rejected");
        }
        Ok(value?)
    }
}
