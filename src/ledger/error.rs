//! Ledger error taxonomy

use thiserror::Error;

/// Errors produced by the ledger store, the balance mutator and the
/// orchestrator. They bubble unchanged to the HTTP boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input, rejected before any store access
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Balance guard failed
    #[error("Insufficient fund")]
    InsufficientFunds,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to begin unit of work: {0}")]
    BeginFailed(String),

    #[error("Failed to commit unit of work: {0}")]
    CommitFailed(String),

    /// Statement, lock or connection failure inside a unit of work
    #[error("Store error: {0}")]
    Store(String),

    /// Invariant violated; never expected
    #[error("Fatal ledger error: {0}")]
    Fatal(String),
}

impl LedgerError {
    /// Transient store failures the caller may retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::BeginFailed(_) | LedgerError::CommitFailed(_) | LedgerError::Store(_)
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }
}

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => LedgerError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                LedgerError::Conflict("already exists".to_string())
            }
            _ => LedgerError::Store(e.to_string()),
        }
    }
}

impl From<crate::currency::CurrencyError> for LedgerError {
    fn from(e: crate::currency::CurrencyError) -> Self {
        LedgerError::Validation(e.to_string())
    }
}
