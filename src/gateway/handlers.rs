//! HTTP handlers
//!
//! Write handlers run decode -> validate -> invoke -> encode with the
//! helpers in [`super::pipeline`].

pub mod health;
pub mod helpers;
pub mod transactions;
pub mod wallet;

pub use health::{HealthResponse, health_check};
pub use transactions::{get_transaction, list_transactions};
pub use wallet::{deposit, get_balances, get_history, transfer, withdraw};
