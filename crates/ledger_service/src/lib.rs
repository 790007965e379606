//! Ledger Service Layer
//!
//! Async entry point to the ledger engine for a host application.
//!
//! # Architecture
//!
//! - **Config**: `ServiceConfig` from defaults and `LEDGER_*` variables
//! - **Service**: `LedgerService`, a tokio facade that bounds reads with a
//!   timeout
//! - **Persistence**: `WriteThrough`, the engine sink that stores each
//!   change set in PostgreSQL before it commits
//! - **Telemetry**: global `tracing` subscriber setup
//! - **Error Handling**: `ServiceError` wrapping engine, database and runtime failures
//!
//! # Example
//!
//! ```rust,ignore
//! use ledger_service::{LedgerService, ServiceConfig};
//!
//! let config = ServiceConfig::from_env()?;
//! let service = LedgerService::connect(&config).await?;
//! let position = service.cash_bank_position(owner).await?;
//! ```

pub mod config;
pub mod error;
pub mod persistence;
pub mod service;
pub mod telemetry;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use persistence::WriteThrough;
pub use service::LedgerService;
pub use telemetry::init_tracing;
