//! Gateway types
//!
//! - [`response`]: error envelope, [`ApiError`] and error codes
//! - [`wallet`]: request and response DTOs for wallet and transaction endpoints

pub mod response;
pub mod wallet;

pub use response::{ApiError, ApiResult, ErrorEnvelope, error_codes};
pub use wallet::{
    BalanceQuery, BalanceView, BalancesResponse, HistoryItem, HistoryQuery, HistoryResponse, MovementRequest,
    ReferenceQuery, TransactionResponse, TransactionsResponse, TransferRequest,
};
