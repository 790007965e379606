//! Test Utilities Crate
//!
//! Shared test infrastructure for the ledger workspace.
//!
//! # Modules
//!
//! - `fixtures`: fixed amounts, instants and ids, random party names
//! - `builders`: seeded engine scenarios
//! - `database`: PostgreSQL test containers
//! - `assertions`: balance and error assertions
//! - `generators`: property-based test data generators
//! - `tracing`: once-only test log subscriber

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;
pub mod tracing;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
pub use self::tracing::init_test_tracing;
