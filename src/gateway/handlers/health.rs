//! Health check handler

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Response};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::gateway::pipeline::encode;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiError, ErrorEnvelope};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_i64)]
    pub timestamp_ms: i64,
}

/// Health check endpoint
///
/// Pings the ledger store and the idempotency cache. Failure details are
/// logged, not returned.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "A dependency is unreachable", body = ErrorEnvelope)
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    if let Err(e) = state.store().health_check().await {
        tracing::error!(error = %e, "[HEALTH] ledger store ping failed");
        return Err(ApiError::service_unavailable("unavailable"));
    }
    if let Err(e) = state.idempotency.cache().health_check().await {
        tracing::error!(error = %e, "[HEALTH] idempotency cache ping failed");
        return Err(ApiError::service_unavailable("unavailable"));
    }

    Ok(encode(
        StatusCode::OK,
        &HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp_ms: Utc::now().timestamp_millis(),
        },
    ))
}
