//! Exactly-once write requests
//!
//! - [`cache`]: the shared key-value capability ([`redis_cache`] / [`memory`])
//! - [`record`]: keys, body fingerprints and cached responses
//! - [`coordinator`]: the absent / pending / completed state machine
//! - [`middleware`]: the axum decorator around write endpoints

pub mod cache;
pub mod coordinator;
pub mod memory;
pub mod middleware;
pub mod record;
pub mod redis_cache;

pub use cache::{CacheError, IdempotencyCache};
pub use coordinator::{Admission, IdempotencyCoordinator, IdempotencyError};
pub use memory::MemoryCache;
pub use middleware::idempotency_middleware;
pub use record::{CachedResponse, IDEMPOTENCY_HEADER, IdempotencyKey};
pub use redis_cache::RedisCache;
