//! Balance mutator
//!
//! The only path that changes a wallet balance. One guarded conditional
//! update; commit authority stays with the caller's unit of work.

use tracing::{debug, error};

use super::error::LedgerError;
use super::store::UnitOfWork;
use super::types::WalletKey;

/// Apply `delta` to the wallet at `key`.
///
/// - zero delta is a caller error
/// - zero rows affected with `delta <= 0` means the balance guard failed
/// - zero rows affected with `delta > 0` means the wallet row is missing
pub async fn adjust(uow: &mut dyn UnitOfWork, key: &WalletKey, delta: i64) -> Result<(), LedgerError> {
    if delta == 0 {
        return Err(LedgerError::validation("amount must not be zero"));
    }

    let rows = uow.apply_delta(key, delta).await?;
    if rows > 0 {
        debug!(wallet = %key, delta, "Balance adjusted");
        return Ok(());
    }

    if delta <= 0 {
        debug!(wallet = %key, delta, "Balance guard rejected debit");
        Err(LedgerError::InsufficientFunds)
    } else {
        error!(wallet = %key, delta, "Credit affected no rows");
        Err(LedgerError::Fatal(format!("credit to {key} affected no rows")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedgerStore;
    use crate::ledger::store::LedgerStore;

    async fn store_with(balance: i64) -> (MemoryLedgerStore, WalletKey) {
        let store = MemoryLedgerStore::new();
        let key = WalletKey::new("alice", "SGD");
        store.seed_wallet(&key, balance);
        (store, key)
    }

    #[tokio::test]
    async fn test_credit_and_debit() {
        let (store, key) = store_with(100).await;
        let mut uow = store.begin().await.unwrap();
        adjust(uow.as_mut(), &key, 50).await.unwrap();
        adjust(uow.as_mut(), &key, -150).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.wallet(&key).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_zero_delta_rejected() {
        let (store, key) = store_with(100).await;
        let mut uow = store.begin().await.unwrap();
        let err = adjust(uow.as_mut(), &key, 0).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_debit_guard() {
        let (store, key) = store_with(100).await;
        let mut uow = store.begin().await.unwrap();
        let err = adjust(uow.as_mut(), &key, -101).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds);
        uow.rollback().await.unwrap();

        assert_eq!(store.wallet(&key).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_debit_missing_wallet_is_insufficient() {
        let store = MemoryLedgerStore::new();
        let mut uow = store.begin().await.unwrap();
        let err = adjust(uow.as_mut(), &WalletKey::new("ghost", "SGD"), -1)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_credit_missing_wallet_is_fatal() {
        let store = MemoryLedgerStore::new();
        let mut uow = store.begin().await.unwrap();
        let err = adjust(uow.as_mut(), &WalletKey::new("ghost", "SGD"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Fatal(_)));
        assert!(!err.is_transient());
    }
}
