//! Wallet handlers: deposit, withdraw, transfer, balances, history

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::Response,
};

use super::helpers::{page_request, query};
use crate::gateway::auth::Caller;
use crate::gateway::pipeline::{decode, encode, validate};
use crate::gateway::state::AppState;
use crate::gateway::types::{
    ApiResult, BalanceQuery, BalanceView, BalancesResponse, ErrorEnvelope, HistoryItem,
    HistoryQuery, HistoryResponse, MovementRequest, TransactionResponse, TransferRequest,
};
use crate::ledger::{Movement, TransferOrder};

fn movement(state: &AppState, owner: String, req: MovementRequest) -> ApiResult<Movement> {
    let currency = state.currencies.resolve(&req.currency)?.code.clone();
    Ok(Movement {
        owner,
        currency,
        amount: req.amount,
        reference: req.reference,
        metadata: req.metadata.unwrap_or_else(|| serde_json::json!({})),
    })
}

/// Deposit into the caller's wallet
#[utoipa::path(
    post,
    path = "/api/v1/wallets/deposit",
    request_body = MovementRequest,
    params(
        ("X-Idempotency-Key" = Option<String>, Header, description = "Client idempotency key")
    ),
    responses(
        (status = 201, description = "Deposit completed", body = TransactionResponse),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 401, description = "Missing caller identity", body = ErrorEnvelope),
        (status = 409, description = "Idempotency conflict", body = ErrorEnvelope),
        (status = 503, description = "Idempotency service down", body = ErrorEnvelope)
    ),
    security(("caller" = [])),
    tag = "Wallet"
)]
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    body: Bytes,
) -> ApiResult<Response> {
    let req: MovementRequest = decode(&body)?;
    validate(&req)?;
    let movement = movement(&state, owner, req)?;

    let tx = state.orchestrator.deposit(movement).await?;
    Ok(encode(
        StatusCode::CREATED,
        &TransactionResponse::from_transaction(&tx, &state.currencies),
    ))
}

/// Withdraw from the caller's wallet
#[utoipa::path(
    post,
    path = "/api/v1/wallets/withdraw",
    request_body = MovementRequest,
    params(
        ("X-Idempotency-Key" = Option<String>, Header, description = "Client idempotency key")
    ),
    responses(
        (status = 201, description = "Withdrawal completed", body = TransactionResponse),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 401, description = "Missing caller identity", body = ErrorEnvelope),
        (status = 409, description = "Idempotency conflict", body = ErrorEnvelope),
        (status = 422, description = "Insufficient fund", body = ErrorEnvelope),
        (status = 503, description = "Idempotency service down", body = ErrorEnvelope)
    ),
    security(("caller" = [])),
    tag = "Wallet"
)]
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    body: Bytes,
) -> ApiResult<Response> {
    let req: MovementRequest = decode(&body)?;
    validate(&req)?;
    let movement = movement(&state, owner, req)?;

    let tx = state.orchestrator.withdraw(movement).await?;
    Ok(encode(
        StatusCode::CREATED,
        &TransactionResponse::from_transaction(&tx, &state.currencies),
    ))
}

/// Transfer from the caller to `receiver`
#[utoipa::path(
    post,
    path = "/api/v1/wallets/transfer",
    request_body = TransferRequest,
    params(
        ("X-Idempotency-Key" = Option<String>, Header, description = "Client idempotency key")
    ),
    responses(
        (status = 201, description = "Transfer completed", body = TransactionResponse),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 401, description = "Missing caller identity", body = ErrorEnvelope),
        (status = 404, description = "Wallet not found", body = ErrorEnvelope),
        (status = 409, description = "Idempotency conflict", body = ErrorEnvelope),
        (status = 422, description = "Insufficient fund", body = ErrorEnvelope),
        (status = 503, description = "Idempotency service down", body = ErrorEnvelope)
    ),
    security(("caller" = [])),
    tag = "Wallet"
)]
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    Caller(sender): Caller,
    body: Bytes,
) -> ApiResult<Response> {
    let req: TransferRequest = decode(&body)?;
    validate(&req)?;
    let currency = state.currencies.resolve(&req.currency)?.code.clone();

    let tx = state
        .orchestrator
        .transfer(TransferOrder {
            sender,
            receiver: req.receiver.trim().to_string(),
            currency,
            amount: req.amount,
            reference: req.reference,
            metadata: req.metadata.unwrap_or_else(|| serde_json::json!({})),
        })
        .await?;
    Ok(encode(
        StatusCode::CREATED,
        &TransactionResponse::from_transaction(&tx, &state.currencies),
    ))
}

/// Balances of the caller's wallets
#[utoipa::path(
    get,
    path = "/api/v1/wallets/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Wallet balances", body = BalancesResponse),
        (status = 400, description = "Unsupported currency", body = ErrorEnvelope),
        (status = 401, description = "Missing caller identity", body = ErrorEnvelope)
    ),
    security(("caller" = [])),
    tag = "Wallet"
)]
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    params: Result<Query<BalanceQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let params = query(params)?;
    let currencies = match params.currencies.as_deref() {
        Some(list) if !list.trim().is_empty() => list
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| state.currencies.resolve(c).map(|cur| cur.code.clone()))
            .collect::<Result<Vec<_>, _>>()?,
        _ => state.currencies.codes().map(str::to_string).collect(),
    };

    let wallets = state.orchestrator.balances(&owner, &currencies).await?;
    let balances = wallets
        .iter()
        .map(|w| BalanceView::from_wallet(w, &state.currencies))
        .collect();
    Ok(encode(StatusCode::OK, &BalancesResponse { balances }))
}

/// Ledger history of one of the caller's wallets, newest first
#[utoipa::path(
    get,
    path = "/api/v1/wallets/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "One page of history", body = HistoryResponse),
        (status = 400, description = "Invalid query", body = ErrorEnvelope),
        (status = 401, description = "Missing caller identity", body = ErrorEnvelope)
    ),
    security(("caller" = [])),
    tag = "Wallet"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let params = query(params)?;
    let currency = state.currencies.resolve(&params.currency)?.code.clone();
    let page = page_request(params.limit, params.starting_after)?;

    let history = state.orchestrator.history(&owner, &currency, &page).await?;
    Ok(encode(
        StatusCode::OK,
        &HistoryResponse {
            items: history
                .items
                .iter()
                .map(|row| HistoryItem::from_history(row, &state.currencies))
                .collect(),
            has_more: history.has_more,
        },
    ))
}
