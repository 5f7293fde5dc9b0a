//! In-memory idempotency cache with expiry and outage injection

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::cache::{CacheError, IdempotencyCache};

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Instant,
}

impl Slot {
    fn live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    slots: Arc<DashMap<String, Slot>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail `set` only; `set_if_absent` keeps working so a request can be
    /// admitted and then fail at completion.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots.iter().filter(|s| s.live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), CacheError> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdempotencyCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check(&self.fail_reads)?;
        let now = Instant::now();
        Ok(self
            .slots
            .get(key)
            .filter(|slot| slot.live(now))
            .map(|slot| slot.value.clone()))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        self.check(&self.fail_reads)?;
        let now = Instant::now();
        let slot = Slot {
            value: value.to_string(),
            expires_at: now + ttl,
        };
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().live(now) {
                    return Ok(false);
                }
                occupied.insert(slot);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(true)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.check(&self.fail_writes)?;
        self.slots.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check(&self.fail_writes)?;
        self.slots.remove(key);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        self.check(&self.fail_reads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_respects_expiry() {
        let cache = MemoryCache::new();
        let short = Duration::from_millis(20);

        assert!(cache.set_if_absent("k", "a", short).await.unwrap());
        assert!(!cache.set_if_absent("k", "b", short).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("a"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.set_if_absent("k", "c", short).await.unwrap());
    }

    #[tokio::test]
    async fn test_outage_flags() {
        let cache = MemoryCache::new();
        cache.fail_writes(true);
        assert!(cache.set("k", "v", Duration::from_secs(1)).await.is_err());
        assert!(cache.set_if_absent("k", "v", Duration::from_secs(1)).await.unwrap());

        cache.fail_reads(true);
        assert!(cache.get("k").await.is_err());
        assert!(cache.health_check().await.is_err());
    }
}
