//! Read-only reports over payments, documents and advances
//!
//! Payment-out reports leave cancelled payments out and bucket by the
//! business calendar day of the payment date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use core_kernel::{CustomerId, DateRange, Money, OwnerId, SupplierId, Timezone};

use crate::activity::ActivityEntry;
use crate::advance::SupplierAdvance;
use crate::bill::Bill;
use crate::cheque::PaymentOutStatus;
use crate::error::LedgerError;
use crate::invoice::{Invoice, PaymentStatus};
use crate::method::PaymentMethod;
use crate::parties::{Customer, Supplier};
use crate::payment_out::PaymentOut;
use crate::store::Books;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceDetails {
    pub given: Money,
    pub used: Money,
    pub remaining: Money,
}

/// What a supplier is owed and holds on account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPaymentInfo {
    pub supplier: Supplier,
    pub outstanding: Money,
    pub advance_balance: Money,
    pub advance: AdvanceDetails,
    pub bills: Vec<Bill>,
}

/// What a customer owes or holds as credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPaymentInfo {
    pub customer: Customer,
    pub outstanding_due: Money,
    pub available_credit: Money,
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPaymentSummary {
    pub supplier: SupplierId,
    pub business_name: String,
    pub payment_count: usize,
    pub total_amount: Money,
    pub total_allocated_to_bills: Money,
    pub total_advance: Money,
    pub methods: Vec<PaymentMethod>,
    pub average_payment: Money,
}

/// Totals of one business day, split by method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRegister {
    pub date: NaiveDate,
    pub payment_count: usize,
    pub total_amount: Money,
    pub cash: Money,
    pub bank_transfer: Money,
    pub upi: Money,
    pub card: Money,
    pub cheque: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodBreakdown {
    pub method: PaymentMethod,
    pub payment_count: usize,
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancePaymentsReport {
    /// Newest first
    pub payments: Vec<PaymentOut>,
    pub total_advance_given: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnappliedAdvances {
    /// Largest remaining first
    pub advances: Vec<SupplierAdvance>,
    pub total_unapplied: Money,
}

/// Report builder over a snapshot of the books
pub struct Reports<'a> {
    books: &'a Books,
    timezone: &'a Timezone,
}

impl<'a> Reports<'a> {
    pub fn new(books: &'a Books, timezone: &'a Timezone) -> Self {
        Self { books, timezone }
    }

    /// Cheques written but not yet cleared or bounced, oldest first
    pub fn pending_cheques(&self, owner: OwnerId) -> Vec<PaymentOut> {
        let mut cheques: Vec<PaymentOut> = self
            .books
            .payments_out
            .values()
            .filter(|p| p.owner == owner && p.method.is_cheque() && p.status == PaymentOutStatus::Pending)
            .cloned()
            .collect();
        cheques.sort_by_key(|p| (p.payment_date, p.created_at));
        cheques
    }

    /// Unpaid and partly paid bills of a supplier, oldest bill date first
    pub fn supplier_outstanding_bills(
        &self,
        owner: OwnerId,
        supplier: SupplierId,
    ) -> Result<Vec<Bill>, LedgerError> {
        self.books.supplier(owner, supplier)?;
        let mut bills: Vec<Bill> = self
            .books
            .bills
            .values()
            .filter(|b| {
                b.owner == owner
                    && b.supplier == supplier
                    && !b.is_deleted
                    && b.payment_status != PaymentStatus::Paid
            })
            .cloned()
            .collect();
        bills.sort_by_key(|b| (b.bill_date, b.created_at));
        Ok(bills)
    }

    pub fn supplier_payment_info(
        &self,
        owner: OwnerId,
        supplier: SupplierId,
    ) -> Result<SupplierPaymentInfo, LedgerError> {
        let record = self.books.supplier(owner, supplier)?.clone();
        let advance = self.books.advances.get(owner, supplier).map_or(
            AdvanceDetails { given: Money::ZERO, used: Money::ZERO, remaining: Money::ZERO },
            |a| AdvanceDetails {
                given: a.total_given(),
                used: a.total_used(),
                remaining: a.remaining(),
            },
        );
        Ok(SupplierPaymentInfo {
            outstanding: record.outstanding_balance(),
            advance_balance: record.advance_balance(),
            bills: self.supplier_outstanding_bills(owner, supplier)?,
            supplier: record,
            advance,
        })
    }

    /// Unpaid and partly paid invoices of a customer, oldest first
    pub fn customer_outstanding_invoices(
        &self,
        owner: OwnerId,
        customer: CustomerId,
    ) -> Result<Vec<Invoice>, LedgerError> {
        self.books.customer(owner, customer)?;
        let mut invoices: Vec<Invoice> = self
            .books
            .invoices
            .values()
            .filter(|i| i.owner == owner && i.customer == customer && i.payment_status != PaymentStatus::Paid)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| (i.created_at, i.id));
        Ok(invoices)
    }

    pub fn customer_payment_info(
        &self,
        owner: OwnerId,
        customer: CustomerId,
    ) -> Result<CustomerPaymentInfo, LedgerError> {
        let record = self.books.customer(owner, customer)?.clone();
        Ok(CustomerPaymentInfo {
            outstanding_due: record.outstanding_due(),
            available_credit: record.available_credit(),
            invoices: self.customer_outstanding_invoices(owner, customer)?,
            customer: record,
        })
    }

    /// Activity lines of a customer, newest first
    pub fn customer_activity(&self, owner: OwnerId, customer: CustomerId) -> Result<Vec<ActivityEntry>, LedgerError> {
        self.books.customer(owner, customer)?;
        Ok(self
            .books
            .activity
            .iter()
            .rev()
            .filter(|a| a.owner == owner && a.customer == customer)
            .cloned()
            .collect())
    }

    /// Per-supplier totals of payments in `range`, largest total first
    pub fn supplier_summary(
        &self,
        owner: OwnerId,
        range: DateRange,
    ) -> Result<Vec<SupplierPaymentSummary>, LedgerError> {
        let mut grouped: HashMap<SupplierId, SupplierPaymentSummary> = HashMap::new();
        for payment in self.payments_in_range(owner, range)? {
            let summary = grouped.entry(payment.supplier).or_insert_with(|| SupplierPaymentSummary {
                supplier: payment.supplier,
                business_name: self
                    .books
                    .suppliers
                    .get(&payment.supplier)
                    .map(|s| s.business_name.clone())
                    .unwrap_or_default(),
                payment_count: 0,
                total_amount: Money::ZERO,
                total_allocated_to_bills: Money::ZERO,
                total_advance: Money::ZERO,
                methods: Vec::new(),
                average_payment: Money::ZERO,
            });
            summary.payment_count += 1;
            summary.total_amount = summary.total_amount.checked_add(&payment.total_amount)?;
            summary.total_allocated_to_bills = summary
                .total_allocated_to_bills
                .checked_add(&payment.total_allocated_to_bills)?;
            summary.total_advance = summary.total_advance.checked_add(&payment.advance_amount)?;
            if !summary.methods.contains(&payment.method) {
                summary.methods.push(payment.method);
            }
        }

        let mut summaries: Vec<SupplierPaymentSummary> = grouped
            .into_values()
            .map(|mut s| {
                s.average_payment = Money::new(s.total_amount.amount() / Decimal::from(s.payment_count));
                s
            })
            .collect();
        summaries.sort_by(|a, b| b.total_amount.cmp(&a.total_amount).then(a.supplier.cmp(&b.supplier)));
        Ok(summaries)
    }

    /// Day-by-day totals in `range`, newest day first
    pub fn date_wise_register(&self, owner: OwnerId, range: DateRange) -> Result<Vec<DailyRegister>, LedgerError> {
        let mut days: BTreeMap<NaiveDate, DailyRegister> = BTreeMap::new();
        for payment in self.payments_in_range(owner, range)? {
            let date = self.timezone.local_date(payment.payment_date);
            let day = days.entry(date).or_insert_with(|| DailyRegister {
                date,
                payment_count: 0,
                total_amount: Money::ZERO,
                cash: Money::ZERO,
                bank_transfer: Money::ZERO,
                upi: Money::ZERO,
                card: Money::ZERO,
                cheque: Money::ZERO,
            });
            day.payment_count += 1;
            day.total_amount = day.total_amount.checked_add(&payment.total_amount)?;
            let bucket = match payment.method {
                PaymentMethod::Cash => &mut day.cash,
                PaymentMethod::BankTransfer => &mut day.bank_transfer,
                PaymentMethod::Upi => &mut day.upi,
                PaymentMethod::Card => &mut day.card,
                PaymentMethod::Cheque => &mut day.cheque,
            };
            *bucket = bucket.checked_add(&payment.total_amount)?;
        }
        Ok(days.into_values().rev().collect())
    }

    /// Count and total per method in `range`, largest total first
    pub fn method_breakdown(&self, owner: OwnerId, range: DateRange) -> Result<Vec<MethodBreakdown>, LedgerError> {
        let mut rows: Vec<MethodBreakdown> = Vec::new();
        for payment in self.payments_in_range(owner, range)? {
            match rows.iter_mut().find(|r| r.method == payment.method) {
                Some(row) => {
                    row.payment_count += 1;
                    row.total_amount = row.total_amount.checked_add(&payment.total_amount)?;
                }
                None => rows.push(MethodBreakdown {
                    method: payment.method,
                    payment_count: 1,
                    total_amount: payment.total_amount,
                }),
            }
        }
        rows.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
        Ok(rows)
    }

    /// Payments in `range` that put money on account
    pub fn advance_payments(&self, owner: OwnerId, range: DateRange) -> Result<AdvancePaymentsReport, LedgerError> {
        let mut payments: Vec<PaymentOut> = self
            .payments_in_range(owner, range)?
            .into_iter()
            .filter(|p| p.advance_amount.is_positive())
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        let amounts: Vec<Money> = payments.iter().map(|p| p.advance_amount).collect();
        Ok(AdvancePaymentsReport {
            total_advance_given: Money::checked_sum(&amounts)?,
            payments,
        })
    }

    /// Suppliers holding unused advance
    pub fn unapplied_advances(&self, owner: OwnerId) -> Result<UnappliedAdvances, LedgerError> {
        let mut advances: Vec<SupplierAdvance> = self
            .books
            .advances
            .records_for(owner)
            .filter(|a| a.remaining().is_positive())
            .cloned()
            .collect();
        advances.sort_by(|a, b| b.remaining().cmp(&a.remaining()).then(a.supplier.cmp(&b.supplier)));
        let remaining: Vec<Money> = advances.iter().map(|a| a.remaining()).collect();
        Ok(UnappliedAdvances {
            total_unapplied: Money::checked_sum(&remaining)?,
            advances,
        })
    }

    fn payments_in_range(&self, owner: OwnerId, range: DateRange) -> Result<Vec<&'a PaymentOut>, LedgerError> {
        let bounds = range.to_utc_bounds(self.timezone)?;
        let mut payments: Vec<&PaymentOut> = self
            .books
            .payments_out
            .values()
            .filter(|p| {
                p.owner == owner && p.status != PaymentOutStatus::Cancelled && bounds.contains(p.payment_date)
            })
            .collect();
        payments.sort_by_key(|p| (p.payment_date, p.id));
        Ok(payments)
    }
}
