//! Test log output
//!
//! `cargo test -- --nocapture` with `RUST_LOG=domain_ledger=debug` shows the
//! engine's rollback and drift logs next to the failing assertion.

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

static TEST_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // another harness may already own the global subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

/// Installs the test subscriber once per test binary
pub fn init_test_tracing() {
    Lazy::force(&TEST_SUBSCRIBER);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
        tracing::info!("still fine");
    }
}
