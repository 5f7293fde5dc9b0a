//! Idempotency records and key derivation

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Request header carrying the client idempotency key
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Cache value of a request that is still executing
pub const PENDING: &str = "pending";

/// Scope of one deduplicated operation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey {
    pub caller: String,
    pub key: String,
    pub operation: String,
}

impl IdempotencyKey {
    pub fn new(
        caller: impl Into<String>,
        key: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            caller: caller.into(),
            key: key.into(),
            operation: operation.into(),
        }
    }

    /// Cache key. Components are length-prefixed so no two distinct triples
    /// collide, whatever characters the client puts in them.
    pub fn cache_key(&self) -> String {
        format!(
            "idempotency:{}:{}|{}:{}|{}",
            self.caller.len(),
            self.caller,
            self.operation.len(),
            self.operation,
            self.key
        )
    }
}

/// Operation name of a request: the last non-empty path segment.
///
/// Accepts a bare path or a full URL; query and fragment are ignored.
pub fn operation_name(target: &str) -> &str {
    let path = match target.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => target,
    };
    let path = path.split(['?', '#']).next().unwrap_or("");
    path.split('/').rfind(|s| !s.is_empty()).unwrap_or("")
}

/// Fingerprint of a request body
pub fn body_hash(body: &[u8]) -> String {
    format!("{:x}", md5::compute(body))
}

/// A captured HTTP response, replayed verbatim for duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    /// Base64 of the raw body bytes
    pub body: String,
    pub body_hash: String,
}

impl CachedResponse {
    pub fn new(
        status_code: u16,
        headers: Vec<(String, String)>,
        body: &[u8],
        body_hash: String,
    ) -> Self {
        Self {
            status_code,
            headers,
            body: STANDARD.encode(body),
            body_hash,
        }
    }

    pub fn body_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.body)
    }
}

/// Decoded cache value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Pending,
    Completed(CachedResponse),
}

impl Record {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        if raw == PENDING {
            return Ok(Record::Pending);
        }
        serde_json::from_str(raw).map(Record::Completed)
    }
}
