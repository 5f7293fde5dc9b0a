//! Redis-backed idempotency cache

use std::time::Duration;

use async_trait::async_trait;
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use super::cache::{CacheError, IdempotencyCache};

/// Shares one multiplexed connection; `ConnectionManager` reconnects on failure
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        info!(url = %url, "Connecting to Redis");

        let client = Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        info!("Redis connection established");
        Ok(Self { manager })
    }
}

#[async_trait]
impl IdempotencyCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        // SET NX replies nil when the key exists
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<Option<String>>(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[test]
    fn test_ttl_never_zero() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_set_if_absent() {
        let cache = RedisCache::connect(TEST_REDIS_URL).await.unwrap();
        let key = format!("test:{}", ulid::Ulid::new());
        let ttl = Duration::from_secs(5);

        assert!(cache.set_if_absent(&key, "pending", ttl).await.unwrap());
        assert!(!cache.set_if_absent(&key, "other", ttl).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("pending"));

        cache.set(&key, "done", ttl).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("done"));

        cache.delete(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }
}
