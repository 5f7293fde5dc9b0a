use std::sync::Arc;
use std::time::Duration;

use crate::currency::CurrencyRegistry;
use crate::idempotency::IdempotencyCoordinator;
use crate::ledger::{LedgerStore, TransferOrchestrator};
use crate::users::SignupService;

/// Gateway shared state
pub struct AppState {
    pub orchestrator: Arc<TransferOrchestrator>,
    pub idempotency: Arc<IdempotencyCoordinator>,
    pub currencies: Arc<CurrencyRegistry>,
    pub signup: Arc<SignupService>,
    /// Upper bound for a whole request
    pub request_timeout: Duration,
}

impl AppState {
    /// Fails when the idempotency pending marker would expire before a
    /// request running into `request_timeout` has finished.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        idempotency: Arc<IdempotencyCoordinator>,
        currencies: Arc<CurrencyRegistry>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        if idempotency.pending_ttl() <= request_timeout {
            anyhow::bail!(
                "idempotency pending TTL ({:?}) must exceed the request timeout ({:?})",
                idempotency.pending_ttl(),
                request_timeout
            );
        }
        Ok(Self {
            orchestrator: Arc::new(TransferOrchestrator::new(store.clone())),
            signup: Arc::new(SignupService::new(store, currencies.clone())),
            idempotency,
            currencies,
            request_timeout,
        })
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        self.orchestrator.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::MemoryCache;
    use crate::ledger::MemoryLedgerStore;

    fn state(pending_ttl: Duration, request_timeout: Duration) -> anyhow::Result<AppState> {
        let coordinator = IdempotencyCoordinator::new(
            Arc::new(MemoryCache::new()),
            pending_ttl,
            Duration::from_secs(3600),
        );
        AppState::new(
            Arc::new(MemoryLedgerStore::new()),
            Arc::new(coordinator),
            Arc::new(CurrencyRegistry::default()),
            request_timeout,
        )
    }

    #[test]
    fn test_pending_ttl_must_exceed_timeout() {
        assert!(state(Duration::from_millis(50), Duration::from_secs(5)).is_err());
        assert!(state(Duration::from_secs(5), Duration::from_secs(5)).is_err());
        assert!(state(Duration::from_secs(6), Duration::from_secs(5)).is_ok());
    }
}
