//! Customers, suppliers and supplier advance records
//!
//! The cached balances (customer dues, supplier payable and advance) are
//! stored as plain columns next to the opening figures the audit needs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{CustomerId, Money, OwnerId, SupplierId};
use domain_ledger::{AdvanceApplication, Customer, Supplier, SupplierAdvance};

use crate::codec::{decode_counter, encode_counter};
use crate::error::DatabaseError;

pub(crate) const SELECT_CUSTOMER: &str =
    "SELECT id, owner_id, name, phone, dues, opening_dues, version, created_at FROM customers";

pub(crate) const SELECT_SUPPLIER: &str = r#"
    SELECT id, owner_id, business_name, contact_person, outstanding_balance,
           opening_outstanding, advance_balance, total_advance_given, version, created_at
    FROM suppliers
"#;

pub(crate) const SELECT_ADVANCE: &str = r#"
    SELECT owner_id, supplier_id, total_given, total_used, applications, version
    FROM supplier_advances
"#;

pub(crate) async fn upsert_customer(conn: &mut PgConnection, customer: &Customer) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO customers (id, owner_id, name, phone, dues, opening_dues, version, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            phone = EXCLUDED.phone,
            dues = EXCLUDED.dues,
            version = EXCLUDED.version
        "#,
    )
    .bind(Uuid::from(customer.id))
    .bind(Uuid::from(customer.owner))
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(customer.dues().amount())
    .bind(customer.opening_dues().amount())
    .bind(encode_counter(customer.version)?)
    .bind(customer.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn upsert_supplier(conn: &mut PgConnection, supplier: &Supplier) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO suppliers (
            id, owner_id, business_name, contact_person, outstanding_balance,
            opening_outstanding, advance_balance, total_advance_given, version, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            business_name = EXCLUDED.business_name,
            contact_person = EXCLUDED.contact_person,
            outstanding_balance = EXCLUDED.outstanding_balance,
            advance_balance = EXCLUDED.advance_balance,
            total_advance_given = EXCLUDED.total_advance_given,
            version = EXCLUDED.version
        "#,
    )
    .bind(Uuid::from(supplier.id))
    .bind(Uuid::from(supplier.owner))
    .bind(&supplier.business_name)
    .bind(&supplier.contact_person)
    .bind(supplier.outstanding_balance().amount())
    .bind(supplier.opening_outstanding().amount())
    .bind(supplier.advance_balance().amount())
    .bind(supplier.total_advance_given().amount())
    .bind(encode_counter(supplier.version)?)
    .bind(supplier.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn upsert_advance(conn: &mut PgConnection, record: &SupplierAdvance) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO supplier_advances (owner_id, supplier_id, total_given, total_used, remaining, applications, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (owner_id, supplier_id) DO UPDATE SET
            total_given = EXCLUDED.total_given,
            total_used = EXCLUDED.total_used,
            remaining = EXCLUDED.remaining,
            applications = EXCLUDED.applications,
            version = EXCLUDED.version
        "#,
    )
    .bind(Uuid::from(record.owner))
    .bind(Uuid::from(record.supplier))
    .bind(record.total_given().amount())
    .bind(record.total_used().amount())
    .bind(record.remaining().amount())
    .bind(Json(&record.applications))
    .bind(encode_counter(record.version)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Database row for a customer
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub dues: Decimal,
    pub opening_dues: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl CustomerRow {
    pub fn into_customer(self) -> Result<Customer, DatabaseError> {
        let mut customer = Customer::new(OwnerId::from_uuid(self.owner_id), self.name, self.created_at)
            .with_stored_dues(Money::new(self.opening_dues), Money::new(self.dues));
        customer.id = CustomerId::from_uuid(self.id);
        customer.phone = self.phone;
        customer.version = decode_counter(self.version)?;
        Ok(customer)
    }
}

/// Database row for a supplier
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplierRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub business_name: String,
    pub contact_person: Option<String>,
    pub outstanding_balance: Decimal,
    pub opening_outstanding: Decimal,
    pub advance_balance: Decimal,
    pub total_advance_given: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl SupplierRow {
    pub fn into_supplier(self) -> Result<Supplier, DatabaseError> {
        let mut supplier = Supplier::new(OwnerId::from_uuid(self.owner_id), self.business_name, self.created_at)
            .with_opening_outstanding(Money::new(self.opening_outstanding))
            .with_balances(
                Money::new(self.outstanding_balance),
                Money::new(self.advance_balance),
                Money::new(self.total_advance_given),
            );
        supplier.id = SupplierId::from_uuid(self.id);
        supplier.contact_person = self.contact_person;
        supplier.version = decode_counter(self.version)?;
        Ok(supplier)
    }
}

/// Database row for a supplier's advance record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdvanceRow {
    pub owner_id: Uuid,
    pub supplier_id: Uuid,
    pub total_given: Decimal,
    pub total_used: Decimal,
    pub applications: Json<Vec<AdvanceApplication>>,
    pub version: i64,
}

impl AdvanceRow {
    /// `remaining` is recomputed from the two totals rather than read back
    pub fn into_advance(self) -> Result<SupplierAdvance, DatabaseError> {
        let mut record = SupplierAdvance::from_totals(
            OwnerId::from_uuid(self.owner_id),
            SupplierId::from_uuid(self.supplier_id),
            Money::new(self.total_given),
            Money::new(self.total_used),
        )?;
        record.applications = self.applications.0;
        record.version = decode_counter(self.version)?;
        Ok(record)
    }
}
