//! HTTP decorator for write endpoints
//!
//! Applies to POST and PUT requests that carry `X-Idempotency-Key`. The
//! response of the first execution is captured and replayed for identical
//! retries. Only responses below 500 are recorded; on any other 5xx the
//! pending marker is cleared so the client can retry with the same key. A 503 keeps
//! the marker until it expires, since the outcome of a timed-out request is
//! not known.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use super::coordinator::{Admission, IdempotencyCoordinator};
use super::record::{CachedResponse, IDEMPOTENCY_HEADER, IdempotencyKey, body_hash, operation_name};
use crate::gateway::types::ApiError;

/// Largest request or response body the decorator buffers
const MAX_BODY_BYTES: usize = 1024 * 1024;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub async fn idempotency_middleware(
    State(coordinator): State<Arc<IdempotencyCoordinator>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::POST && request.method() != Method::PUT {
        return next.run(request).await;
    }
    let Some(client_key) = header_str(request.headers(), IDEMPOTENCY_HEADER).map(str::to_string)
    else {
        return next.run(request).await;
    };

    let caller = header_str(request.headers(), AUTHORIZATION.as_str())
        .unwrap_or_default()
        .to_string();
    let key = IdempotencyKey::new(caller, client_key, operation_name(request.uri().path()));

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(idempotency_key = %key.key, error = %e, "Failed to read request body");
            return ApiError::bad_request("request body too large or unreadable").into_response();
        }
    };
    let request_hash = body_hash(&body);
    let request = Request::from_parts(parts, Body::from(body));

    match coordinator.begin(&key, &request_hash).await {
        Err(e) => ApiError::from(e).into_response(),
        Ok(Admission::InFlight) => {
            ApiError::conflict("request with this idempotency key is in progress, retry with exponential backoff")
                .into_response()
        }
        Ok(Admission::Mismatch) => {
            ApiError::conflict("idempotency key does not match the first request's parameters")
                .into_response()
        }
        Ok(Admission::Replay(cached)) => replay(&cached),
        Ok(Admission::Proceed) => {
            let response = next.run(request).await;
            record(&coordinator, &key, request_hash, response).await
        }
    }
}

/// Capture a fresh response and store it as the completed record
async fn record(
    coordinator: &IdempotencyCoordinator,
    key: &IdempotencyKey,
    request_hash: String,
    response: Response,
) -> Response {
    let status = response.status();
    if status.is_server_error() {
        if status != StatusCode::SERVICE_UNAVAILABLE {
            coordinator.abandon(key).await;
        }
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(idempotency_key = %key.key, error = %e, "Failed to buffer response body");
            coordinator.abandon(key).await;
            return ApiError::internal("please try again").into_response();
        }
    };

    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let cached = CachedResponse::new(status.as_u16(), headers, &body, request_hash);

    if let Err(e) = coordinator.complete(key, &cached).await {
        // The side effect may be durable; the client must not retry blindly
        return ApiError::from(e).into_response();
    }
    Response::from_parts(parts, Body::from(body))
}

fn replay(cached: &CachedResponse) -> Response {
    rebuild(cached).unwrap_or_else(|| {
        error!(status = cached.status_code, "Cached response could not be rebuilt");
        ApiError::internal("please try again").into_response()
    })
}

fn rebuild(cached: &CachedResponse) -> Option<Response> {
    let status = StatusCode::from_u16(cached.status_code).ok()?;
    let body = cached.body_bytes().ok()?;
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in &cached.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
        let value = HeaderValue::from_str(value).ok()?;
        headers.append(name, value);
    }
    Some(response)
}
