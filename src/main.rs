//! Wallet Ledger service
//!
//! ```text
//! HTTP ──▶ request log ──▶ idempotency ──▶ timeout ──▶ handler
//!                              │                         │
//!                            Redis                  PostgreSQL
//! ```

use std::sync::Arc;

use anyhow::Context;
use wallet_ledger::config::AppConfig;
use wallet_ledger::currency::CurrencyRegistry;
use wallet_ledger::db::Database;
use wallet_ledger::gateway::{run_server, state::AppState};
use wallet_ledger::idempotency::{IdempotencyCoordinator, RedisCache};
use wallet_ledger::ledger::PgLedgerStore;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = wallet_ledger::logging::init_logging(&app_config);

    tracing::info!("Starting Wallet Ledger in {} mode", env);

    let currencies = Arc::new(
        CurrencyRegistry::from_config(&app_config.currencies)
            .context("Invalid currency configuration")?,
    );
    tracing::info!(
        currencies = ?currencies.codes().collect::<Vec<_>>(),
        "Currency registry loaded"
    );

    let db = Database::connect(&app_config.postgres_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.init_schema()
        .await
        .context("Failed to initialize schema")?;
    let store = Arc::new(PgLedgerStore::new(db.pool().clone()));

    let cache = RedisCache::connect(&app_config.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    tracing::info!("Connected to Redis");
    let idempotency = Arc::new(IdempotencyCoordinator::new(
        Arc::new(cache),
        app_config.pending_ttl(),
        app_config.redis.completed_ttl(),
    ));

    let state = Arc::new(AppState::new(
        store,
        idempotency,
        currencies,
        app_config.gateway.request_timeout(),
    )?);

    run_server(&app_config.gateway, state).await
}
