//! Ledger store capabilities
//!
//! [`LedgerStore`] hands out units of work and serves the read paths.
//! [`UnitOfWork`] is one atomic scope: every write goes through it and becomes
//! visible only on [`UnitOfWork::commit`]. Dropping an uncommitted unit of work
//! discards it, so a cancelled request never leaves a partial write behind.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::error;

use super::error::LedgerError;
use super::types::{
    Account, LedgerEntry, Page, PageRequest, Transaction, TxHistory, Wallet, WalletKey,
};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work. Failures map to [`LedgerError::BeginFailed`].
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, LedgerError>;

    async fn wallet(&self, key: &WalletKey) -> Result<Wallet, LedgerError>;

    /// Wallets of `owner` for the given currencies, ordered by currency.
    /// Currencies the owner has no wallet for are skipped.
    async fn wallets(&self, owner: &str, currencies: &[String]) -> Result<Vec<Wallet>, LedgerError>;

    /// Ledger history of one wallet, newest first
    async fn history(
        &self,
        key: &WalletKey,
        page: &PageRequest,
    ) -> Result<Page<TxHistory>, LedgerError>;

    async fn transaction(&self, uid: &str) -> Result<Transaction, LedgerError>;

    /// Transactions initiated by `owner` carrying `reference`, newest first
    async fn transactions_by_reference(
        &self,
        owner: &str,
        reference: &str,
        page: &PageRequest,
    ) -> Result<Page<Transaction>, LedgerError>;

    /// Ledger entries of one transaction
    async fn entries(&self, tx_uid: &str) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Insert an account and one zero-balance wallet per currency atomically.
    /// A taken username maps to [`LedgerError::Conflict`].
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        currencies: &[String],
    ) -> Result<Account, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    /// Take an exclusive lock on a wallet row until commit or rollback.
    /// A missing wallet maps to [`LedgerError::NotFound`].
    async fn lock_wallet(&mut self, key: &WalletKey) -> Result<Wallet, LedgerError>;

    /// `balance = balance + delta`, guarded by `balance >= -delta` when the
    /// delta is negative. Returns the number of rows affected.
    async fn apply_delta(&mut self, key: &WalletKey, delta: i64) -> Result<u64, LedgerError>;

    async fn insert_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError>;

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError>;

    /// Failures map to [`LedgerError::CommitFailed`]
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Run `body` inside one unit of work.
///
/// Commits when `body` succeeds. On error the unit of work is rolled back and
/// the original error returned; a rollback failure is only logged.
pub async fn with_unit_of_work<T, F>(store: &dyn LedgerStore, body: F) -> Result<T, LedgerError>
where
    F: for<'u> FnOnce(&'u mut dyn UnitOfWork) -> BoxFuture<'u, Result<T, LedgerError>>,
{
    let mut uow = store.begin().await?;

    let outcome = body(uow.as_mut()).await;
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = uow.rollback().await {
                error!(error = %rollback_err, cause = %e, "Rollback failed");
            }
            Err(e)
        }
    }
}
