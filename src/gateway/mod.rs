pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod pipeline;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use crate::idempotency::idempotency_middleware;
use middleware::{request_log_middleware, timeout_middleware};
use state::AppState;

/// Assemble the HTTP API.
///
/// Write routes sit behind the idempotency decorator, which wraps the
/// request timeout so a timed-out write is seen as a 503 by the decorator.
pub fn build_router(state: Arc<AppState>) -> Router {
    let wallet_writes = Router::new()
        .route("/deposit", post(handlers::deposit))
        .route("/withdraw", post(handlers::withdraw))
        .route("/transfer", post(handlers::transfer))
        .layer(from_fn_with_state(state.clone(), timeout_middleware))
        .layer(from_fn_with_state(
            state.idempotency.clone(),
            idempotency_middleware,
        ));

    let wallet_reads = Router::new()
        .route("/balance", get(handlers::get_balances))
        .route("/history", get(handlers::get_history))
        .layer(from_fn_with_state(state.clone(), timeout_middleware));

    let transaction_routes = Router::new()
        .route("/api/v1/transactions", get(handlers::list_transactions))
        .route("/api/v1/transactions/{uid}", get(handlers::get_transaction))
        .layer(from_fn_with_state(state.clone(), timeout_middleware));

    let user_routes = Router::new()
        .route("/signup", post(crate::users::handlers::signup))
        .layer(from_fn_with_state(state.clone(), timeout_middleware));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1/users", user_routes)
        .nest("/api/v1/wallets", wallet_writes.merge(wallet_reads))
        .merge(transaction_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(from_fn(request_log_middleware))
}

/// Serve until SIGINT or SIGTERM, then drain in-flight requests
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!(addr = %addr, "Gateway listening");
    info!("API docs: http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Shutdown signal received (Ctrl+C)"),
        _ = terminate => info!("Shutdown signal received (SIGTERM)"),
    }
}
