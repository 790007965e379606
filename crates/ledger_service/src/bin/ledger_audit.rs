//! Ledger Audit Binary
//!
//! Restores the cash/bank books from PostgreSQL and checks every owner's
//! cached balances against the ledger.
//!
//! # Usage
//!
//! ```bash
//! # One pass, exit status 2 on drift
//! LEDGER_DATABASE_URL=postgres://... cargo run --bin ledger-audit
//!
//! # Keep auditing every LEDGER_AUDIT_INTERVAL_SECS until Ctrl+C
//! LEDGER_DATABASE_URL=postgres://... cargo run --bin ledger-audit -- --watch
//! ```
//!
//! # Environment Variables
//!
//! * `LEDGER_DATABASE_URL` - PostgreSQL connection string
//! * `LEDGER_TIMEZONE` - Business timezone (default: Asia/Kolkata)
//! * `LEDGER_AUDIT_INTERVAL_SECS` - Seconds between passes in watch mode (default: 300)
//! * `LEDGER_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `LEDGER_LOG_JSON` - Emit JSON log lines (default: false)

use anyhow::{bail, Context};
use std::sync::Arc;

use ledger_service::{init_tracing, LedgerService, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env().context("loading LEDGER_* configuration")?;
    init_tracing(&config).context("installing log subscriber")?;

    if config.database_url.is_none() {
        bail!("LEDGER_DATABASE_URL is required to audit stored books");
    }

    let service = Arc::new(
        LedgerService::connect(&config)
            .await
            .context("restoring books from the database")?,
    );

    if std::env::args().any(|arg| arg == "--watch") {
        let Some(every) = config.audit_interval() else {
            bail!("--watch needs LEDGER_AUDIT_INTERVAL_SECS above zero");
        };
        tracing::info!(interval_secs = every.as_secs(), "watching books for drift");
        let task = service.spawn_audit_task(every);
        tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
        task.abort();
        tracing::info!("audit watch stopped");
        return Ok(());
    }

    let reports = service.audit_all().await?;
    let drifting: Vec<_> = reports.iter().filter(|r| !r.is_clean()).collect();
    for report in &drifting {
        for drift in &report.drifts {
            println!(
                "{}\t{:?}\t{}\tstored={}\texpected={}",
                report.owner, drift.kind, drift.entity_id, drift.stored, drift.expected
            );
        }
    }
    tracing::info!(owners = reports.len(), drifting = drifting.len(), "audit finished");

    if !drifting.is_empty() {
        std::process::exit(2);
    }
    Ok(())
}
