//! Transaction lookups

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::Response,
};

use super::helpers::{page_request, query};
use crate::gateway::auth::Caller;
use crate::gateway::pipeline::encode;
use crate::gateway::state::AppState;
use crate::gateway::types::{
    ApiError, ApiResult, ErrorEnvelope, ReferenceQuery, TransactionResponse, TransactionsResponse,
};

/// Transactions initiated by the caller with a given reference, newest first
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(ReferenceQuery),
    responses(
        (status = 200, description = "One page of transactions", body = TransactionsResponse),
        (status = 400, description = "Invalid query", body = ErrorEnvelope),
        (status = 401, description = "Missing caller identity", body = ErrorEnvelope)
    ),
    security(("caller" = [])),
    tag = "Transactions"
)]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    params: Result<Query<ReferenceQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let params = query(params)?;
    if params.reference.trim().is_empty() {
        return Err(ApiError::bad_request("reference is mandatory"));
    }
    let page = page_request(params.limit, params.starting_after)?;

    let result = state
        .orchestrator
        .transactions_by_reference(&owner, params.reference.trim(), &page)
        .await?;
    Ok(encode(
        StatusCode::OK,
        &TransactionsResponse {
            items: result
                .items
                .iter()
                .map(|tx| TransactionResponse::from_transaction(tx, &state.currencies))
                .collect(),
            has_more: result.has_more,
        },
    ))
}

/// One transaction, visible to its initiator only
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{uid}",
    params(("uid" = String, Path, description = "Transaction uid")),
    responses(
        (status = 200, description = "Transaction", body = TransactionResponse),
        (status = 401, description = "Missing caller identity", body = ErrorEnvelope),
        (status = 404, description = "Not found", body = ErrorEnvelope)
    ),
    security(("caller" = [])),
    tag = "Transactions"
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    Path(uid): Path<String>,
) -> ApiResult<Response> {
    let tx = state.orchestrator.transaction(&owner, &uid).await?;
    Ok(encode(
        StatusCode::OK,
        &TransactionResponse::from_transaction(&tx, &state.currencies),
    ))
}
