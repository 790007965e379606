//! Test Scenario Builder
//!
//! Seeds an engine with named bank accounts, cash, customers, invoices,
//! suppliers and bills so a test only spells out what it is about.
//!
//! ```rust,ignore
//! let scenario = ScenarioBuilder::new()
//!     .with_bank("hdfc", dec!(10000))
//!     .with_customer("asha", dec!(0))
//!     .with_invoice("asha", "INV-1", dec!(1000))
//!     .build()?;
//! let invoice = scenario.invoice("INV-1");
//! ```

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use core_kernel::{BankAccountId, BillId, CustomerId, InvoiceId, Money, OwnerId, SupplierId};
use domain_ledger::{
    AccountRef, BankAccount, Bill, CashDirection, CashTransactionRequest, Customer, EngineConfig,
    Invoice, LedgerEngine, LedgerError, ManualClock, Supplier,
};

use crate::fixtures::{IdFixtures, TemporalFixtures};

enum Seed {
    Bank { key: String, opening: Decimal },
    Cash(Decimal),
    Customer { key: String, dues: Decimal },
    Invoice { customer: String, number: String, total: Decimal },
    Supplier { key: String },
    Bill { supplier: String, number: String, total: Decimal },
}

/// Builder for a seeded [`TestScenario`]
pub struct ScenarioBuilder {
    owner: OwnerId,
    config: EngineConfig,
    seeds: Vec<Seed>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self {
            owner: IdFixtures::owner_id(),
            config: EngineConfig::default(),
            seeds: Vec::new(),
        }
    }

    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Opens a bank account reachable as `key`
    pub fn with_bank(mut self, key: &str, opening: Decimal) -> Self {
        self.seeds.push(Seed::Bank { key: key.to_string(), opening });
        self
    }

    /// Puts cash in hand through an `in` entry from the external category
    pub fn with_cash(mut self, amount: Decimal) -> Self {
        self.seeds.push(Seed::Cash(amount));
        self
    }

    /// Registers a customer with opening dues (negative for credit)
    pub fn with_customer(mut self, key: &str, dues: Decimal) -> Self {
        self.seeds.push(Seed::Customer { key: key.to_string(), dues });
        self
    }

    pub fn with_invoice(mut self, customer: &str, number: &str, total: Decimal) -> Self {
        self.seeds.push(Seed::Invoice {
            customer: customer.to_string(),
            number: number.to_string(),
            total,
        });
        self
    }

    pub fn with_supplier(mut self, key: &str) -> Self {
        self.seeds.push(Seed::Supplier { key: key.to_string() });
        self
    }

    pub fn with_bill(mut self, supplier: &str, number: &str, total: Decimal) -> Self {
        self.seeds.push(Seed::Bill {
            supplier: supplier.to_string(),
            number: number.to_string(),
            total,
        });
        self
    }

    /// Runs every seed through the engine's public operations, in order
    ///
    /// # Errors
    ///
    /// Propagates the engine error of the first seed that fails. Referring to
    /// a customer or supplier key that was not seeded first is a validation
    /// error.
    pub fn build(self) -> Result<TestScenario, LedgerError> {
        let clock = Arc::new(ManualClock::new(TemporalFixtures::business_now()));
        let engine = LedgerEngine::with_clock(self.config, clock.clone());
        let owner = self.owner;
        let now = TemporalFixtures::business_now();
        let mut scenario = TestScenario {
            engine,
            owner,
            clock,
            banks: HashMap::new(),
            customers: HashMap::new(),
            invoices: HashMap::new(),
            suppliers: HashMap::new(),
            bills: HashMap::new(),
        };

        for seed in self.seeds {
            match seed {
                Seed::Bank { key, opening } => {
                    let account = scenario.engine.open_bank_account(
                        owner,
                        BankAccount::new(owner, key.clone(), format!("ACC-{}", key), Money::new(opening), now),
                    )?;
                    scenario.banks.insert(key, account.id);
                }
                Seed::Cash(amount) => {
                    scenario.engine.create_cash_transaction(
                        owner,
                        CashTransactionRequest::new(
                            CashDirection::In,
                            AccountRef::external("opening-cash")?,
                            Money::new(amount),
                        )
                        .with_description("Opening cash"),
                    )?;
                }
                Seed::Customer { key, dues } => {
                    let customer = scenario.engine.register_customer(
                        owner,
                        Customer::new(owner, key.clone(), now).with_opening_dues(Money::new(dues)),
                    )?;
                    scenario.customers.insert(key, customer.id);
                }
                Seed::Invoice { customer, number, total } => {
                    let customer = scenario.lookup(&scenario.customers, &customer, "customer")?;
                    let invoice = scenario
                        .engine
                        .record_invoice(owner, Invoice::new(owner, customer, number.clone(), Money::new(total), now))?;
                    scenario.invoices.insert(number, invoice.id);
                }
                Seed::Supplier { key } => {
                    let supplier = scenario
                        .engine
                        .register_supplier(owner, Supplier::new(owner, key.clone(), now))?;
                    scenario.suppliers.insert(key, supplier.id);
                }
                Seed::Bill { supplier, number, total } => {
                    let supplier = scenario.lookup(&scenario.suppliers, &supplier, "supplier")?;
                    let bill = scenario.engine.record_bill(
                        owner,
                        Bill::new(owner, supplier, number.clone(), TemporalFixtures::bill_date(), Money::new(total), now),
                    )?;
                    scenario.bills.insert(number, bill.id);
                }
            }
        }

        Ok(scenario)
    }
}

/// An engine seeded by [`ScenarioBuilder`], with its ids by key
pub struct TestScenario {
    pub engine: LedgerEngine,
    pub owner: OwnerId,
    /// The engine's clock, for moving time between operations
    pub clock: Arc<ManualClock>,
    banks: HashMap<String, BankAccountId>,
    customers: HashMap<String, CustomerId>,
    invoices: HashMap<String, InvoiceId>,
    suppliers: HashMap<String, SupplierId>,
    bills: HashMap<String, BillId>,
}

impl TestScenario {
    fn lookup<T: Copy>(&self, map: &HashMap<String, T>, key: &str, what: &str) -> Result<T, LedgerError> {
        map.get(key)
            .copied()
            .ok_or_else(|| LedgerError::validation(format!("no {} seeded as '{}'", what, key)))
    }

    /// # Panics
    ///
    /// Panics if no bank was seeded under `key`
    pub fn bank(&self, key: &str) -> BankAccountId {
        self.banks[key]
    }

    pub fn customer(&self, key: &str) -> CustomerId {
        self.customers[key]
    }

    pub fn invoice(&self, number: &str) -> InvoiceId {
        self.invoices[number]
    }

    pub fn supplier(&self, key: &str) -> SupplierId {
        self.suppliers[key]
    }

    pub fn bill(&self, number: &str) -> BillId {
        self.bills[number]
    }

    /// Current cached balance of a seeded bank account
    pub fn bank_balance(&self, key: &str) -> Money {
        self.engine
            .bank_account(self.owner, self.bank(key))
            .map(|a| a.current_balance())
            .unwrap_or(Money::ZERO)
    }
}
