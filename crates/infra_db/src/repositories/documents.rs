//! Sales invoices and purchase bills
//!
//! A bill's audit trail is stored inline as JSONB.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{BillId, CustomerId, InvoiceId, Money, OwnerId, SupplierId};
use domain_ledger::{Bill, BillAuditEntry, Invoice, PaymentStatus};

use crate::codec::{decode_counter, encode_counter};
use crate::error::DatabaseError;

pub(crate) const SELECT_INVOICE: &str = r#"
    SELECT id, owner_id, customer_id, invoice_no, total_amount, paid_amount,
           returned_amount, payment_status, version, created_at
    FROM invoices
"#;

pub(crate) const SELECT_BILL: &str = r#"
    SELECT id, owner_id, supplier_id, bill_no, bill_date, due_date, total_amount,
           paid_amount, credit_applied, outstanding_amount, payment_status,
           is_deleted, audit, version, created_at
    FROM bills
"#;

pub(crate) async fn upsert_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, owner_id, customer_id, invoice_no, total_amount, paid_amount,
            returned_amount, payment_status, version, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            paid_amount = EXCLUDED.paid_amount,
            returned_amount = EXCLUDED.returned_amount,
            payment_status = EXCLUDED.payment_status,
            version = EXCLUDED.version
        "#,
    )
    .bind(Uuid::from(invoice.id))
    .bind(Uuid::from(invoice.owner))
    .bind(Uuid::from(invoice.customer))
    .bind(&invoice.invoice_no)
    .bind(invoice.total_amount.amount())
    .bind(invoice.paid_amount.amount())
    .bind(invoice.returned_amount.amount())
    .bind(invoice.payment_status.as_str())
    .bind(encode_counter(invoice.version)?)
    .bind(invoice.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn upsert_bill(conn: &mut PgConnection, bill: &Bill) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO bills (
            id, owner_id, supplier_id, bill_no, bill_date, due_date, total_amount,
            paid_amount, credit_applied, outstanding_amount, payment_status,
            is_deleted, audit, version, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (id) DO UPDATE SET
            due_date = EXCLUDED.due_date,
            paid_amount = EXCLUDED.paid_amount,
            credit_applied = EXCLUDED.credit_applied,
            outstanding_amount = EXCLUDED.outstanding_amount,
            payment_status = EXCLUDED.payment_status,
            is_deleted = EXCLUDED.is_deleted,
            audit = EXCLUDED.audit,
            version = EXCLUDED.version
        "#,
    )
    .bind(Uuid::from(bill.id))
    .bind(Uuid::from(bill.owner))
    .bind(Uuid::from(bill.supplier))
    .bind(&bill.bill_no)
    .bind(bill.bill_date)
    .bind(bill.due_date)
    .bind(bill.total_amount.amount())
    .bind(bill.paid_amount.amount())
    .bind(bill.credit_applied.amount())
    .bind(bill.outstanding_amount.amount())
    .bind(bill.payment_status.as_str())
    .bind(bill.is_deleted)
    .bind(Json(&bill.audit))
    .bind(encode_counter(bill.version)?)
    .bind(bill.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Database row for an invoice
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_no: String,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub returned_amount: Decimal,
    pub payment_status: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl InvoiceRow {
    pub fn into_invoice(self) -> Result<Invoice, DatabaseError> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(self.id),
            owner: OwnerId::from_uuid(self.owner_id),
            customer: CustomerId::from_uuid(self.customer_id),
            invoice_no: self.invoice_no,
            total_amount: Money::new(self.total_amount),
            paid_amount: Money::new(self.paid_amount),
            returned_amount: Money::new(self.returned_amount),
            payment_status: self.payment_status.parse::<PaymentStatus>()?,
            version: decode_counter(self.version)?,
            created_at: self.created_at,
        })
    }
}

/// Database row for a bill
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub supplier_id: Uuid,
    pub bill_no: String,
    pub bill_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub credit_applied: Decimal,
    pub outstanding_amount: Decimal,
    pub payment_status: String,
    pub is_deleted: bool,
    pub audit: Json<Vec<BillAuditEntry>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl BillRow {
    pub fn into_bill(self) -> Result<Bill, DatabaseError> {
        Ok(Bill {
            id: BillId::from_uuid(self.id),
            owner: OwnerId::from_uuid(self.owner_id),
            supplier: SupplierId::from_uuid(self.supplier_id),
            bill_no: self.bill_no,
            bill_date: self.bill_date,
            due_date: self.due_date,
            total_amount: Money::new(self.total_amount),
            paid_amount: Money::new(self.paid_amount),
            credit_applied: Money::new(self.credit_applied),
            outstanding_amount: Money::new(self.outstanding_amount),
            payment_status: self.payment_status.parse::<PaymentStatus>()?,
            is_deleted: self.is_deleted,
            audit: self.audit.0,
            version: decode_counter(self.version)?,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_ledger::BillAction;
    use rust_decimal_macros::dec;

    fn bill_row() -> BillRow {
        BillRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            bill_no: "CP/2024/118".to_string(),
            bill_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            total_amount: dec!(8000),
            paid_amount: dec!(3000),
            credit_applied: dec!(500),
            outstanding_amount: dec!(4500),
            payment_status: "partial".to_string(),
            is_deleted: false,
            audit: Json(vec![BillAuditEntry {
                action: BillAction::PaymentApplied,
                amount: Money::new(dec!(3000)),
                payment_out: None,
                note: "PAY-20240305-0001".to_string(),
                at: Utc::now(),
            }]),
            version: 2,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_bill_row_keeps_amounts_and_audit_trail() {
        let bill = bill_row().into_bill().unwrap();

        assert_eq!(bill.outstanding_amount, bill.computed_outstanding());
        assert_eq!(bill.payment_status, PaymentStatus::Partial);
        assert_eq!(bill.audit.len(), 1);
        assert_eq!(bill.audit[0].action, BillAction::PaymentApplied);
    }

    #[test]
    fn test_unknown_settlement_status_is_corrupt() {
        let mut row = bill_row();
        row.payment_status = "overdue".to_string();

        assert!(matches!(row.into_bill(), Err(DatabaseError::CorruptRow(_))));
    }

    #[test]
    fn test_invoice_row_decodes() {
        let row = InvoiceRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            invoice_no: "INV-0042".to_string(),
            total_amount: dec!(1180),
            paid_amount: dec!(1000),
            returned_amount: dec!(180),
            payment_status: "paid".to_string(),
            version: 1,
            created_at: Utc::now(),
        };

        let invoice = row.into_invoice().unwrap();

        assert_eq!(invoice.balance(), Money::ZERO);
        assert_eq!(invoice.payment_status, invoice.derived_status());
    }
}
