//! Ledger data model
//!
//! Amounts are integer minor units. `Transaction` and `LedgerEntry` are
//! immutable once inserted; `Wallet` balances only change through
//! [`crate::ledger::balance::adjust`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Deposit,
    Withdraw,
    Transfer,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Deposit => "deposit",
            TxType::Withdraw => "withdraw",
            TxType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TxType::Deposit),
            "withdraw" => Ok(TxType::Withdraw),
            "transfer" => Ok(TxType::Transfer),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Transaction status.
///
/// Only `Completed` is ever written: a failed operation rolls back its whole
/// unit of work instead of leaving a non-terminal row behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
            TxStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxStatus::Pending),
            "completed" => Ok(TxStatus::Completed),
            "failed" => Ok(TxStatus::Failed),
            "cancelled" => Ok(TxStatus::Cancelled),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// Side of a balance effect. Stored as a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn code(&self) -> &'static str {
        match self {
            Direction::Credit => "c",
            Direction::Debit => "d",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "c" => Some(Direction::Credit),
            "d" => Some(Direction::Debit),
            _ => None,
        }
    }

    /// Signed balance delta for a positive magnitude
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            Direction::Credit => amount,
            Direction::Debit => -amount,
        }
    }
}

/// Wallet identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletKey {
    pub owner: String,
    pub currency: String,
}

impl WalletKey {
    pub fn new(owner: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            currency: currency.into(),
        }
    }
}

impl fmt::Display for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub owner: String,
    pub currency: String,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub uid: String,
    pub reference: Option<String>,
    pub tx_type: TxType,
    pub initiated_by: String,
    pub status: TxStatus,
    pub amount: i64,
    pub currency: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub tx_uid: String,
    pub owner: String,
    pub currency: String,
    /// Always positive; the sign lives in `direction`
    pub amount: i64,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
}

/// One row of a wallet's history: a ledger entry joined with its transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHistory {
    pub uid: String,
    pub tx_type: TxType,
    pub status: TxStatus,
    pub direction: Direction,
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// A registered account. `username` is the wallet owner identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Cursor pagination request.
///
/// `starting_after` is the last transaction uid the caller has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub starting_after: Option<String>,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;

    pub fn new(limit: usize, starting_after: Option<String>) -> Self {
        Self {
            limit,
            starting_after: starting_after.filter(|s| !s.is_empty()),
        }
    }

    /// Rows to fetch: one more than the page so `has_more` needs no COUNT query
    pub fn fetch_limit(&self) -> usize {
        self.limit + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Build a page from an over-fetched result set (`limit + 1` rows).
    pub fn from_overfetch(mut rows: Vec<T>, limit: usize) -> Self {
        let has_more = rows.len() > limit;
        if has_more {
            rows.truncate(limit);
        }
        Self {
            items: rows,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_type_roundtrip_names() {
        for t in [TxType::Deposit, TxType::Withdraw, TxType::Transfer] {
            assert_eq!(t.as_str().parse::<TxType>().unwrap(), t);
        }
        assert!("refund".parse::<TxType>().is_err());
    }

    #[test]
    fn test_direction_codes() {
        assert_eq!(Direction::from_code("c"), Some(Direction::Credit));
        assert_eq!(Direction::from_code("d "), Some(Direction::Debit));
        assert_eq!(Direction::from_code("x"), None);
        assert_eq!(Direction::Debit.signed(50), -50);
        assert_eq!(Direction::Credit.signed(50), 50);
    }

    #[test]
    fn test_page_from_overfetch() {
        let page = Page::from_overfetch(vec![1, 2, 3], 2);
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_more);

        let page = Page::from_overfetch(vec![1, 2], 2);
        assert_eq!(page.items, vec![1, 2]);
        assert!(!page.has_more);

        let page: Page<i32> = Page::from_overfetch(vec![], 5);
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn test_page_request_empty_cursor() {
        let req = PageRequest::new(10, Some(String::new()));
        assert_eq!(req.starting_after, None);
        assert_eq!(req.fetch_limit(), 11);
    }
}
