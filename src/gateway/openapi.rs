//! OpenAPI / Swagger UI documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{
    BalanceView, BalancesResponse, ErrorEnvelope, HistoryItem, HistoryResponse, MovementRequest,
    TransactionResponse, TransactionsResponse, TransferRequest,
};
use crate::ledger::{Direction, TxStatus, TxType};
use crate::users::{SignupRequest, SignupResponse};

/// Caller identity header
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "caller",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Caller identity: the username that owns the wallets being acted on",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wallet Ledger API",
        version = "1.0.0",
        description = "Wallet balances, deposits, withdrawals and transfers with exactly-once writes via X-Idempotency-Key.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::users::handlers::signup,
        crate::gateway::handlers::wallet::deposit,
        crate::gateway::handlers::wallet::withdraw,
        crate::gateway::handlers::wallet::transfer,
        crate::gateway::handlers::wallet::get_balances,
        crate::gateway::handlers::wallet::get_history,
        crate::gateway::handlers::transactions::list_transactions,
        crate::gateway::handlers::transactions::get_transaction,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorEnvelope,
            SignupRequest,
            SignupResponse,
            MovementRequest,
            TransferRequest,
            TransactionResponse,
            TransactionsResponse,
            BalanceView,
            BalancesResponse,
            HistoryItem,
            HistoryResponse,
            TxType,
            TxStatus,
            Direction,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Wallet", description = "Balance movements and queries (caller required)"),
        (name = "Transactions", description = "Transaction lookups (caller required)"),
        (name = "Users", description = "Account signup"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;
