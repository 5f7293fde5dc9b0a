//! Caller identity
//!
//! The caller is whatever the `Authorization` header names. Verifying it is
//! the job of whatever sits in front of the gateway.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::types::ApiError;

/// Identity of the authenticated caller; owner of the wallets it acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl Caller {
    pub fn from_parts(parts: &Parts) -> Option<Self> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Caller(v.to_string()))
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Caller::from_parts(parts).ok_or_else(|| ApiError::unauthenticated("missing caller identity"))
    }
}
