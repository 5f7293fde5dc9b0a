//! Wallet Ledger - multi-currency wallets over a double-entry ledger
//!
//! # Modules
//!
//! - [`ledger`] - Ledger store, balance mutator and transfer orchestrator
//! - [`idempotency`] - Exactly-once replay of keyed HTTP writes
//! - [`gateway`] - HTTP API (axum)
//! - [`users`] - Account signup
//! - [`currency`] - Supported currencies and their precision
//! - [`db`] - PostgreSQL pool and schema
//! - [`config`] / [`logging`] - Process setup

pub mod config;
pub mod currency;
pub mod db;
pub mod gateway;
pub mod idempotency;
pub mod ledger;
pub mod logging;
pub mod users;

pub use currency::{Currency, CurrencyRegistry};
pub use idempotency::{IdempotencyCoordinator, MemoryCache, RedisCache};
pub use ledger::{LedgerError, LedgerStore, MemoryLedgerStore, PgLedgerStore, TransferOrchestrator};
