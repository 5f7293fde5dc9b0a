//! Idempotency coordinator
//!
//! State per key: absent -> pending -> completed. Completed records expire
//! back to absent. Two concurrent requests with one key never both proceed:
//! the pending marker is written with set-if-absent.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

use super::cache::{CacheError, IdempotencyCache};
use super::record::{CachedResponse, IdempotencyKey, PENDING, Record};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyError {
    #[error("Idempotency cache unavailable: {0}")]
    Unavailable(#[from] CacheError),

    #[error("Corrupt idempotency record: {0}")]
    Corrupt(String),
}

/// Outcome of admitting a keyed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// First occurrence; the pending marker is in place
    Proceed,
    /// Completed earlier with the same body
    Replay(CachedResponse),
    /// Another request with this key is still executing
    InFlight,
    /// Key reused with a different body
    Mismatch,
}

pub struct IdempotencyCoordinator {
    cache: Arc<dyn IdempotencyCache>,
    pending_ttl: Duration,
    completed_ttl: Duration,
}

impl IdempotencyCoordinator {
    pub fn new(cache: Arc<dyn IdempotencyCache>, pending_ttl: Duration, completed_ttl: Duration) -> Self {
        Self {
            cache,
            pending_ttl,
            completed_ttl,
        }
    }

    pub fn cache(&self) -> &Arc<dyn IdempotencyCache> {
        &self.cache
    }

    pub fn pending_ttl(&self) -> Duration {
        self.pending_ttl
    }

    pub async fn begin(
        &self,
        key: &IdempotencyKey,
        body_hash: &str,
    ) -> Result<Admission, IdempotencyError> {
        let cache_key = key.cache_key();

        let existing = self.cache.get(&cache_key).await.map_err(|e| {
            error!(idempotency_key = %key.key, error = %e, "Idempotency lookup failed");
            e
        })?;

        let Some(raw) = existing else {
            let written = self
                .cache
                .set_if_absent(&cache_key, PENDING, self.pending_ttl)
                .await
                .map_err(|e| {
                    error!(idempotency_key = %key.key, error = %e, "Failed to write pending marker");
                    e
                })?;
            if !written {
                debug!(idempotency_key = %key.key, "Lost pending race");
                return Ok(Admission::InFlight);
            }
            return Ok(Admission::Proceed);
        };

        match Record::parse(&raw).map_err(|e| IdempotencyError::Corrupt(e.to_string()))? {
            Record::Pending => Ok(Admission::InFlight),
            Record::Completed(cached) if cached.body_hash == body_hash => {
                debug!(idempotency_key = %key.key, operation = %key.operation, "Replaying cached response");
                Ok(Admission::Replay(cached))
            }
            Record::Completed(_) => {
                warn!(idempotency_key = %key.key, operation = %key.operation, "Idempotency key reused with different body");
                Ok(Admission::Mismatch)
            }
        }
    }

    /// Replace the pending marker with the completed response
    pub async fn complete(
        &self,
        key: &IdempotencyKey,
        response: &CachedResponse,
    ) -> Result<(), IdempotencyError> {
        let value =
            serde_json::to_string(response).map_err(|e| IdempotencyError::Corrupt(e.to_string()))?;
        self.cache
            .set(&key.cache_key(), &value, self.completed_ttl)
            .await
            .map_err(|e| {
                error!(idempotency_key = %key.key, error = %e, "Failed to store completed response");
                IdempotencyError::from(e)
            })
    }

    /// Drop the pending marker so the client may retry with the same key.
    /// Failure is logged; the marker then expires on its own.
    pub async fn abandon(&self, key: &IdempotencyKey) {
        if let Err(e) = self.cache.delete(&key.cache_key()).await {
            warn!(idempotency_key = %key.key, error = %e, "Failed to clear pending marker");
        }
    }
}
