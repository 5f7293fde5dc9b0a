//! Wallet and transaction DTOs
//!
//! Amounts cross the API as integer minor units. Responses also carry a
//! display string formatted with the currency's precision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::currency::CurrencyRegistry;
use crate::ledger::{Direction, Transaction, TxHistory, TxStatus, TxType, Wallet};

/// Deposit or withdraw request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MovementRequest {
    #[validate(length(min = 1, max = 8, message = "currency is mandatory"))]
    #[schema(example = "SGD")]
    pub currency: String,
    /// Minor units
    #[validate(range(min = 1, message = "amount must be positive"))]
    #[schema(example = 15000)]
    pub amount: i64,
    #[validate(length(max = 128))]
    #[schema(example = "order-42")]
    pub reference: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TransferRequest {
    #[validate(length(min = 1, max = 64, message = "receiver is mandatory"))]
    #[schema(example = "bob")]
    pub receiver: String,
    #[validate(length(min = 1, max = 8, message = "currency is mandatory"))]
    #[schema(example = "SGD")]
    pub currency: String,
    #[validate(range(min = 1, message = "amount must be positive"))]
    #[schema(example = 2500)]
    pub amount: i64,
    #[validate(length(max = 128))]
    pub reference: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    #[schema(example = "01J9ZQ6C3D4E5F6G7H8J9K0MNP")]
    pub uid: String,
    pub reference: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub initiated_by: String,
    pub status: TxStatus,
    pub amount: i64,
    #[schema(example = "150.00")]
    pub display_amount: String,
    pub currency: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TransactionResponse {
    pub fn from_transaction(tx: &Transaction, currencies: &CurrencyRegistry) -> Self {
        Self {
            uid: tx.uid.clone(),
            reference: tx.reference.clone(),
            tx_type: tx.tx_type,
            initiated_by: tx.initiated_by.clone(),
            status: tx.status,
            amount: tx.amount,
            display_amount: display(currencies, &tx.currency, tx.amount),
            currency: tx.currency.clone(),
            metadata: tx.metadata.clone(),
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionsResponse {
    pub items: Vec<TransactionResponse>,
    pub has_more: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalanceView {
    #[schema(example = "SGD")]
    pub currency: String,
    #[schema(example = 15000)]
    pub balance: i64,
    #[schema(example = "150.00")]
    pub display_balance: String,
    pub updated_at: DateTime<Utc>,
}

impl BalanceView {
    pub fn from_wallet(wallet: &Wallet, currencies: &CurrencyRegistry) -> Self {
        Self {
            currency: wallet.currency.clone(),
            balance: wallet.balance,
            display_balance: display(currencies, &wallet.currency, wallet.balance),
            updated_at: wallet.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalancesResponse {
    pub balances: Vec<BalanceView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryItem {
    pub uid: String,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub status: TxStatus,
    pub direction: Direction,
    pub amount: i64,
    pub display_amount: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryItem {
    pub fn from_history(row: &TxHistory, currencies: &CurrencyRegistry) -> Self {
        Self {
            uid: row.uid.clone(),
            tx_type: row.tx_type,
            status: row.status,
            direction: row.direction,
            amount: row.amount,
            display_amount: display(currencies, &row.currency, row.amount),
            currency: row.currency.clone(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub items: Vec<HistoryItem>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BalanceQuery {
    /// Comma-separated currency codes; all configured currencies when omitted
    #[param(example = "SGD,JPY")]
    pub currencies: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    #[param(example = "SGD")]
    pub currency: String,
    /// 1..=100, default 20
    pub limit: Option<usize>,
    /// Last transaction uid of the previous page
    pub starting_after: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReferenceQuery {
    pub reference: String,
    pub limit: Option<usize>,
    pub starting_after: Option<String>,
}

fn display(currencies: &CurrencyRegistry, code: &str, minor_units: i64) -> String {
    currencies
        .format(code, minor_units)
        .unwrap_or_else(|_| minor_units.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CurrencyRegistry {
        CurrencyRegistry::new([("SGD".to_string(), 2), ("JPY".to_string(), 0)]).unwrap()
    }

    #[test]
    fn test_movement_validation() {
        let req: MovementRequest =
            serde_json::from_str(r#"{"currency":"SGD","amount":0}"#).unwrap();
        assert!(req.validate().is_err());

        let req: MovementRequest =
            serde_json::from_str(r#"{"currency":"SGD","amount":100,"metadata":{"a":1}}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.metadata.unwrap()["a"], 1);
    }

    #[test]
    fn test_transaction_response_shape() {
        let tx = Transaction {
            uid: "01ABC".to_string(),
            reference: None,
            tx_type: TxType::Transfer,
            initiated_by: "alice".to_string(),
            status: TxStatus::Completed,
            amount: 15000,
            currency: "SGD".to_string(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(TransactionResponse::from_transaction(&tx, &registry()))
            .unwrap();
        assert_eq!(json["type"], "transfer");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["display_amount"], "150.00");
    }

    #[test]
    fn test_display_unknown_currency_falls_back() {
        assert_eq!(display(&registry(), "THB", 42), "42");
        assert_eq!(display(&registry(), "JPY", 42), "42");
    }
}
