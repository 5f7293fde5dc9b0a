use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, response::Response};

use super::service::{SignupRequest, SignupResponse};
use crate::gateway::pipeline::{decode, encode, validate};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResult, ErrorEnvelope};

/// Register a new account
///
/// POST /api/v1/users/signup
#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid username or password", body = ErrorEnvelope),
        (status = 409, description = "Username already exists", body = ErrorEnvelope)
    ),
    tag = "Users"
)]
pub async fn signup(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Response> {
    let mut req: SignupRequest = decode(&body)?;
    req.username = req.username.trim().to_string();
    validate(&req)?;

    let account = state.signup.signup(&req).await?;
    Ok(encode(StatusCode::CREATED, &account))
}
