//! Ledger schema
//!
//! Balances are stored in integer minor units. `wallets.balance >= 0` is also
//! a table constraint, but the conditional update in the balance mutator is
//! what enforces it at the mutation boundary.

use sqlx::PgPool;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            BIGSERIAL PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    active        BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_WALLETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    id         BIGSERIAL PRIMARY KEY,
    owner      TEXT NOT NULL,
    currency   TEXT NOT NULL,
    balance    BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (owner, currency)
)
"#;

const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id           BIGSERIAL PRIMARY KEY,
    uid          TEXT NOT NULL UNIQUE,
    reference    TEXT,
    type         TEXT NOT NULL,
    initiated_by TEXT NOT NULL,
    status       TEXT NOT NULL,
    amount       BIGINT NOT NULL CHECK (amount > 0),
    currency     TEXT NOT NULL,
    metadata     JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TRANSACTIONS_REFERENCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS transactions_initiator_reference_idx
    ON transactions (initiated_by, reference, uid DESC)
"#;

const CREATE_LEDGER_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    id         BIGSERIAL PRIMARY KEY,
    tx_uid     TEXT NOT NULL REFERENCES transactions (uid),
    owner      TEXT NOT NULL,
    currency   TEXT NOT NULL,
    amount     BIGINT NOT NULL CHECK (amount > 0),
    direction  CHAR(1) NOT NULL CHECK (direction IN ('c', 'd')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_LEDGER_ENTRIES_OWNER_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS ledger_entries_owner_currency_idx
    ON ledger_entries (owner, currency, tx_uid DESC)
"#;

/// Statements in dependency order
const STATEMENTS: [(&str, &str); 6] = [
    ("users", CREATE_USERS_TABLE),
    ("wallets", CREATE_WALLETS_TABLE),
    ("transactions", CREATE_TRANSACTIONS_TABLE),
    ("transactions_reference_idx", CREATE_TRANSACTIONS_REFERENCE_INDEX),
    ("ledger_entries", CREATE_LEDGER_ENTRIES_TABLE),
    ("ledger_entries_owner_idx", CREATE_LEDGER_ENTRIES_OWNER_INDEX),
];

/// Initialize the ledger schema
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing ledger schema...");

    for (name, statement) in STATEMENTS {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            tracing::error!(object = name, error = %e, "Failed to create schema object");
            e
        })?;
    }

    tracing::info!("Ledger schema initialized successfully");
    Ok(())
}
