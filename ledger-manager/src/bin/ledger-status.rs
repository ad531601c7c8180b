//! Ledger status binary
//!
//! Replays `ledger.json` and logs a balance summary per account.
//! Reads `LEDGER_CONFIG` (a TOML file) when set, then environment overrides.

use anyhow::Context;
use ledger_manager::{Config, LedgerManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("LEDGER_CONFIG") {
        Ok(path) => {
            let mut config = Config::from_file(&path)
                .with_context(|| format!("loading config from {path}"))?;
            config.apply_env()?;
            config
        }
        Err(_) => Config::from_env()?,
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!(
        service = %config.service_name,
        path = ?config.ledger_path,
        "Loading ledger"
    );

    let mut manager = LedgerManager::from_config(&config)?;
    manager.reload_ledger().await.context("replaying ledger")?;
    let ledger = manager.ledger();

    for account in ledger.accounts() {
        tracing::info!(
            identity_id = %account.identity.id,
            name = %account.identity.name,
            active = account.active,
            balance = %account.balance.format_and_trim("g"),
            paid = %account.paid.format_and_trim("g"),
            "Account"
        );
    }

    tracing::info!(
        accounts = ledger.accounts().len(),
        distributions = ledger.distributions().len(),
        events = ledger.event_log().len(),
        latest_timestamp = ?ledger.latest_timestamp(),
        "Ledger loaded"
    );

    if let Some(metrics) = manager.metrics() {
        tracing::debug!(families = metrics.registry().gather().len(), "Sync metrics registered");
    }
    Ok(())
}
