//! Service configuration

use serde::Deserialize;
use std::time::Duration;

use core_kernel::Timezone;
use domain_ledger::EngineConfig;

/// Service configuration
///
/// Loaded from defaults overlaid with `LEDGER_*` environment variables, for
/// example `LEDGER_TIMEZONE=Asia/Dubai` or `LEDGER_QUERY_TIMEOUT_MS=500`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Business timezone (IANA name)
    pub timezone: Timezone,
    /// Upper bound on a read query
    pub query_timeout_ms: u64,
    /// Seconds between background audit passes, 0 disables them
    pub audit_interval_secs: u64,
    /// PostgreSQL connection string; without one the books live in memory
    pub database_url: Option<String>,
    pub receipt_prefix: String,
    pub payment_out_prefix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            log_level: "info".to_string(),
            log_json: false,
            timezone: engine.timezone,
            query_timeout_ms: 2_000,
            audit_interval_secs: 300,
            database_url: None,
            receipt_prefix: engine.receipt_prefix,
            payment_out_prefix: engine.payment_out_prefix,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from the environment
    ///
    /// A `.env` file in the working directory is read first if present.
    ///
    /// # Errors
    ///
    /// Returns `config::ConfigError` if a variable does not parse into its
    /// field, such as an unknown timezone name
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(environment())
    }

    /// Loads configuration from an arbitrary source over the defaults
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn audit_interval(&self) -> Option<Duration> {
        (self.audit_interval_secs > 0).then(|| Duration::from_secs(self.audit_interval_secs))
    }

    /// The settings the engine itself needs
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            timezone: self.timezone,
            receipt_prefix: self.receipt_prefix.clone(),
            payment_out_prefix: self.payment_out_prefix.clone(),
        }
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("LEDGER").try_parsing(true)
}
