//! Service error handling

use thiserror::Error;

use domain_ledger::{ErrorKind, LedgerError};
use infra_db::DatabaseError;

/// Errors surfaced by [`crate::LedgerService`]
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{operation} did not finish within {timeout_ms} ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },

    #[error("Engine task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("No tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

impl ServiceError {
    /// Category of the underlying ledger error, if there is one
    pub fn ledger_kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::Ledger(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Whether the same call may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Ledger(e) => e.is_retryable(),
            ServiceError::Timeout { .. } => true,
            ServiceError::Database(e) => e.is_connection_error(),
            ServiceError::Join(_) | ServiceError::Config(_) | ServiceError::Runtime(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        let error = ServiceError::Timeout { operation: "account_ledger", timeout_ms: 50 };

        assert!(error.is_retryable());
        assert_eq!(error.ledger_kind(), None);
        assert_eq!(error.to_string(), "account_ledger did not finish within 50 ms");
    }

    #[test]
    fn test_ledger_error_keeps_its_kind() {
        let error = ServiceError::from(LedgerError::validation("amount must be positive"));

        assert_eq!(error.ledger_kind(), Some(ErrorKind::Validation));
        assert!(!error.is_retryable());
        assert_eq!(error.to_string(), "Validation failed: amount must be positive");
    }

    #[test]
    fn test_missing_runtime_is_not_retryable() {
        let error = ServiceError::from(tokio::runtime::Handle::try_current().unwrap_err());

        assert!(!error.is_retryable());
        assert!(error.to_string().starts_with("No tokio runtime"));
    }
}
