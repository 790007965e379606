//! Customer receipts, supplier payments and the customer activity log
//!
//! Each payment is one row. Its tender lines, allocations, cheque particulars
//! and audit log are embedded as JSONB since they are only ever read with
//! the payment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{
    ActivityEntryId, BankAccountId, CustomerId, LedgerEntryId, Money, OwnerId, PaymentInId,
    PaymentOutId, SupplierId,
};
use domain_ledger::{
    ActivityEntry, ActivityMethod, BillAllocation, ChequeDetails, InvoiceAllocation, PaymentIn,
    PaymentMethod, PaymentOut, PaymentOutAuditEntry, PaymentOutStatus, ReceiptLine,
};

use crate::codec::{decode_account, decode_counter, encode_counter, AccountColumns};
use crate::error::DatabaseError;

pub(crate) const SELECT_PAYMENT_IN: &str = r#"
    SELECT id, owner_id, customer_id, receipt_number, payment_date, total_amount,
           payment_methods, allocations, credit_applied, excess_amount,
           deposit_kind, deposit_bank_account_id, deposit_category,
           ledger_entry_id, notes, created_at
    FROM payments_in
"#;

pub(crate) const SELECT_PAYMENT_OUT: &str = r#"
    SELECT id, owner_id, supplier_id, payment_no, payment_date, total_amount, method,
           bank_account_id, reference, notes, cheque, allocations,
           total_allocated_to_bills, advance_amount, status, ledger_entry_id,
           reversal_entry_id, cancelled_at, cancellation_reason, audit_log,
           version, created_at
    FROM payments_out
"#;

pub(crate) const SELECT_ACTIVITY: &str = r#"
    SELECT id, owner_id, customer_id, payment_in_id, amount, method, description, created_at
    FROM customer_activity
"#;

/// Receipts are immutable once recorded
pub(crate) async fn insert_payment_in(conn: &mut PgConnection, payment: &PaymentIn) -> Result<(), DatabaseError> {
    let deposit = AccountColumns::encode(&payment.deposit_account);

    sqlx::query(
        r#"
        INSERT INTO payments_in (
            id, owner_id, customer_id, receipt_number, payment_date, total_amount,
            payment_methods, allocations, credit_applied, excess_amount,
            deposit_kind, deposit_bank_account_id, deposit_category,
            ledger_entry_id, notes, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Uuid::from(payment.id))
    .bind(Uuid::from(payment.owner))
    .bind(Uuid::from(payment.customer))
    .bind(&payment.receipt_number)
    .bind(payment.payment_date)
    .bind(payment.total_amount.amount())
    .bind(Json(&payment.payment_methods))
    .bind(Json(&payment.allocations))
    .bind(payment.credit_applied.amount())
    .bind(payment.excess_amount.amount())
    .bind(deposit.kind)
    .bind(deposit.bank_account_id)
    .bind(&deposit.category)
    .bind(Uuid::from(payment.ledger_entry))
    .bind(&payment.notes)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn upsert_payment_out(conn: &mut PgConnection, payment: &PaymentOut) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payments_out (
            id, owner_id, supplier_id, payment_no, payment_date, total_amount, method,
            bank_account_id, reference, notes, cheque, allocations,
            total_allocated_to_bills, advance_amount, status, ledger_entry_id,
            reversal_entry_id, cancelled_at, cancellation_reason, audit_log,
            version, created_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
            $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
        )
        ON CONFLICT (id) DO UPDATE SET
            cheque = EXCLUDED.cheque,
            allocations = EXCLUDED.allocations,
            total_allocated_to_bills = EXCLUDED.total_allocated_to_bills,
            advance_amount = EXCLUDED.advance_amount,
            status = EXCLUDED.status,
            ledger_entry_id = EXCLUDED.ledger_entry_id,
            reversal_entry_id = EXCLUDED.reversal_entry_id,
            cancelled_at = EXCLUDED.cancelled_at,
            cancellation_reason = EXCLUDED.cancellation_reason,
            audit_log = EXCLUDED.audit_log,
            version = EXCLUDED.version
        "#,
    )
    .bind(Uuid::from(payment.id))
    .bind(Uuid::from(payment.owner))
    .bind(Uuid::from(payment.supplier))
    .bind(&payment.payment_no)
    .bind(payment.payment_date)
    .bind(payment.total_amount.amount())
    .bind(payment.method.as_str())
    .bind(payment.bank_account.map(Uuid::from))
    .bind(&payment.reference)
    .bind(&payment.notes)
    .bind(payment.cheque.as_ref().map(Json))
    .bind(Json(&payment.allocations))
    .bind(payment.total_allocated_to_bills.amount())
    .bind(payment.advance_amount.amount())
    .bind(payment.status.as_str())
    .bind(payment.ledger_entry.map(Uuid::from))
    .bind(payment.reversal_entry.map(Uuid::from))
    .bind(payment.cancelled_at)
    .bind(&payment.cancellation_reason)
    .bind(Json(&payment.audit_log))
    .bind(encode_counter(payment.version)?)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_activity(conn: &mut PgConnection, entry: &ActivityEntry) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO customer_activity (id, owner_id, customer_id, payment_in_id, amount, method, description, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Uuid::from(entry.id))
    .bind(Uuid::from(entry.owner))
    .bind(Uuid::from(entry.customer))
    .bind(Uuid::from(entry.payment_in))
    .bind(entry.amount.amount())
    .bind(entry.method.as_str())
    .bind(&entry.description)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Database row for a customer receipt
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentInRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub receipt_number: String,
    pub payment_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub payment_methods: Json<Vec<ReceiptLine>>,
    pub allocations: Json<Vec<InvoiceAllocation>>,
    pub credit_applied: Decimal,
    pub excess_amount: Decimal,
    pub deposit_kind: String,
    pub deposit_bank_account_id: Option<Uuid>,
    pub deposit_category: Option<String>,
    pub ledger_entry_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentInRow {
    pub fn into_payment(self) -> Result<PaymentIn, DatabaseError> {
        Ok(PaymentIn {
            id: PaymentInId::from_uuid(self.id),
            receipt_number: self.receipt_number,
            owner: OwnerId::from_uuid(self.owner_id),
            customer: CustomerId::from_uuid(self.customer_id),
            payment_date: self.payment_date,
            total_amount: Money::new(self.total_amount),
            payment_methods: self.payment_methods.0,
            allocations: self.allocations.0,
            credit_applied: Money::new(self.credit_applied),
            excess_amount: Money::new(self.excess_amount),
            deposit_account: decode_account(
                &self.deposit_kind,
                self.deposit_bank_account_id,
                self.deposit_category.as_deref(),
            )?,
            ledger_entry: LedgerEntryId::from_uuid(self.ledger_entry_id),
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

/// Database row for a supplier payment
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentOutRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub supplier_id: Uuid,
    pub payment_no: String,
    pub payment_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub method: String,
    pub bank_account_id: Option<Uuid>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub cheque: Option<Json<ChequeDetails>>,
    pub allocations: Json<Vec<BillAllocation>>,
    pub total_allocated_to_bills: Decimal,
    pub advance_amount: Decimal,
    pub status: String,
    pub ledger_entry_id: Option<Uuid>,
    pub reversal_entry_id: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub audit_log: Json<Vec<PaymentOutAuditEntry>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl PaymentOutRow {
    pub fn into_payment(self) -> Result<PaymentOut, DatabaseError> {
        Ok(PaymentOut {
            id: PaymentOutId::from_uuid(self.id),
            payment_no: self.payment_no,
            owner: OwnerId::from_uuid(self.owner_id),
            supplier: SupplierId::from_uuid(self.supplier_id),
            payment_date: self.payment_date,
            total_amount: Money::new(self.total_amount),
            method: PaymentMethod::parse(&self.method)?,
            bank_account: self.bank_account_id.map(BankAccountId::from_uuid),
            reference: self.reference,
            notes: self.notes,
            cheque: self.cheque.map(|c| c.0),
            allocations: self.allocations.0,
            total_allocated_to_bills: Money::new(self.total_allocated_to_bills),
            advance_amount: Money::new(self.advance_amount),
            status: self.status.parse::<PaymentOutStatus>()?,
            ledger_entry: self.ledger_entry_id.map(LedgerEntryId::from_uuid),
            reversal_entry: self.reversal_entry_id.map(LedgerEntryId::from_uuid),
            cancelled_at: self.cancelled_at,
            cancellation_reason: self.cancellation_reason,
            audit_log: self.audit_log.0,
            version: decode_counter(self.version)?,
            created_at: self.created_at,
        })
    }
}

/// Database row for an activity line
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub payment_in_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityRow {
    pub fn into_entry(self) -> Result<ActivityEntry, DatabaseError> {
        Ok(ActivityEntry {
            id: ActivityEntryId::from_uuid(self.id),
            owner: OwnerId::from_uuid(self.owner_id),
            customer: CustomerId::from_uuid(self.customer_id),
            payment_in: PaymentInId::from_uuid(self.payment_in_id),
            amount: Money::new(self.amount),
            method: self.method.parse::<ActivityMethod>()?,
            description: self.description,
            created_at: self.created_at,
        })
    }
}
