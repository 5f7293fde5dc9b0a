//! In-memory ledger store
//!
//! Mirrors the row-locking behaviour of the Postgres store so concurrency
//! properties can be exercised without a database:
//! - `lock_wallet` and `apply_delta` take an exclusive per-wallet lock held
//!   until commit or rollback, like `SELECT ... FOR UPDATE` and `UPDATE`
//! - writes are staged in the unit of work and published on commit only
//!
//! Lock waits never time out; a lock-order bug shows up as a hang.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;

use super::error::LedgerError;
use super::store::{LedgerStore, UnitOfWork};
use super::types::{
    Account, Direction, LedgerEntry, Page, PageRequest, Transaction, TxHistory, TxStatus, TxType,
    Wallet, WalletKey,
};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    wallets: BTreeMap<WalletKey, Wallet>,
    /// Committed transactions in commit order
    transactions: Vec<Transaction>,
    entries: Vec<LedgerEntry>,
    next_account_id: i64,
}

impl State {
    fn has_transaction(&self, uid: &str) -> bool {
        self.transactions.iter().any(|t| t.uid == uid)
    }
}

/// Failure injection for rollback tests
#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
    credit_entry: AtomicBool,
}

type RowLocks = DashMap<WalletKey, Arc<tokio::sync::Mutex<()>>>;

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<State>>,
    row_locks: Arc<RowLocks>,
    faults: Arc<Faults>,
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a wallet. A positive opening balance is booked as a deposit so
    /// that replaying ledger entries still reproduces the balance.
    pub fn seed_wallet(&self, key: &WalletKey, balance: i64) {
        let now = Utc::now();
        let mut state = lock_state(&self.state);
        state.wallets.insert(
            key.clone(),
            Wallet {
                owner: key.owner.clone(),
                currency: key.currency.clone(),
                balance: balance.max(0),
                updated_at: now,
            },
        );
        if balance > 0 {
            // one millisecond back so it sorts before any uid issued afterwards
            let uid = ulid::Ulid::from_datetime(
                std::time::SystemTime::now() - std::time::Duration::from_millis(1),
            )
            .to_string();
            state.transactions.push(Transaction {
                uid: uid.clone(),
                reference: Some("opening-balance".to_string()),
                tx_type: TxType::Deposit,
                initiated_by: key.owner.clone(),
                status: TxStatus::Completed,
                amount: balance,
                currency: key.currency.clone(),
                metadata: serde_json::Value::Null,
                created_at: now,
            });
            state.entries.push(LedgerEntry {
                tx_uid: uid,
                owner: key.owner.clone(),
                currency: key.currency.clone(),
                amount: balance,
                direction: Direction::Credit,
                created_at: now,
            });
        }
    }

    pub fn fail_begin(&self, fail: bool) {
        self.faults.begin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.faults.commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.faults.rollback.store(fail, Ordering::SeqCst);
    }

    /// Make every credit ledger-entry insert fail
    pub fn fail_credit_entries(&self, fail: bool) {
        self.faults.credit_entry.store(fail, Ordering::SeqCst);
    }

    /// Credits minus debits over every committed entry of the wallet
    pub fn replayed_balance(&self, key: &WalletKey) -> i64 {
        lock_state(&self.state)
            .entries
            .iter()
            .filter(|e| e.owner == key.owner && e.currency == key.currency)
            .map(|e| e.direction.signed(e.amount))
            .sum()
    }

    pub fn transaction_count(&self) -> usize {
        lock_state(&self.state).transactions.len()
    }

    pub fn entry_count(&self) -> usize {
        lock_state(&self.state).entries.len()
    }

    fn row_lock(&self, key: &WalletKey) -> Arc<tokio::sync::Mutex<()>> {
        self.row_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, LedgerError> {
        if self.faults.begin.load(Ordering::SeqCst) {
            return Err(LedgerError::BeginFailed("injected".to_string()));
        }
        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            held: BTreeMap::new(),
            deltas: BTreeMap::new(),
            transactions: Vec::new(),
            entries: Vec::new(),
        }))
    }

    async fn wallet(&self, key: &WalletKey) -> Result<Wallet, LedgerError> {
        lock_state(&self.state)
            .wallets
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {key}")))
    }

    async fn wallets(&self, owner: &str, currencies: &[String]) -> Result<Vec<Wallet>, LedgerError> {
        let state = lock_state(&self.state);
        let mut wallets: Vec<Wallet> = currencies
            .iter()
            .filter_map(|c| state.wallets.get(&WalletKey::new(owner, c.as_str())).cloned())
            .collect();
        wallets.sort_by(|a, b| a.currency.cmp(&b.currency));
        wallets.dedup_by(|a, b| a.currency == b.currency);
        Ok(wallets)
    }

    async fn history(
        &self,
        key: &WalletKey,
        page: &PageRequest,
    ) -> Result<Page<TxHistory>, LedgerError> {
        let state = lock_state(&self.state);
        let txs: HashMap<&str, &Transaction> = state
            .transactions
            .iter()
            .map(|t| (t.uid.as_str(), t))
            .collect();

        let mut rows: Vec<TxHistory> = state
            .entries
            .iter()
            .filter(|e| e.owner == key.owner && e.currency == key.currency)
            .filter(|e| match &page.starting_after {
                Some(cursor) => e.tx_uid.as_str() < cursor.as_str(),
                None => true,
            })
            .filter_map(|e| {
                txs.get(e.tx_uid.as_str()).map(|t| TxHistory {
                    uid: t.uid.clone(),
                    tx_type: t.tx_type,
                    status: t.status,
                    direction: e.direction,
                    amount: e.amount,
                    currency: e.currency.clone(),
                    created_at: t.created_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.uid.cmp(&a.uid));
        rows.truncate(page.fetch_limit());
        Ok(Page::from_overfetch(rows, page.limit))
    }

    async fn transaction(&self, uid: &str) -> Result<Transaction, LedgerError> {
        lock_state(&self.state)
            .transactions
            .iter()
            .find(|t| t.uid == uid)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {uid}")))
    }

    async fn transactions_by_reference(
        &self,
        owner: &str,
        reference: &str,
        page: &PageRequest,
    ) -> Result<Page<Transaction>, LedgerError> {
        let state = lock_state(&self.state);
        let mut rows: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.initiated_by == owner && t.reference.as_deref() == Some(reference))
            .filter(|t| match &page.starting_after {
                Some(cursor) => t.uid.as_str() < cursor.as_str(),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.uid.cmp(&a.uid));
        rows.truncate(page.fetch_limit());
        Ok(Page::from_overfetch(rows, page.limit))
    }

    async fn entries(&self, tx_uid: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(lock_state(&self.state)
            .entries
            .iter()
            .filter(|e| e.tx_uid == tx_uid)
            .cloned()
            .collect())
    }

    async fn create_account(
        &self,
        username: &str,
        _password_hash: &str,
        currencies: &[String],
    ) -> Result<Account, LedgerError> {
        let now = Utc::now();
        let mut state = lock_state(&self.state);
        if state.accounts.contains_key(username) {
            return Err(LedgerError::Conflict(format!("username {username} already exists")));
        }

        state.next_account_id += 1;
        let account = Account {
            id: state.next_account_id,
            username: username.to_string(),
            created_at: now,
        };
        state.accounts.insert(username.to_string(), account.clone());
        for currency in currencies {
            state
                .wallets
                .entry(WalletKey::new(username, currency.as_str()))
                .or_insert_with(|| Wallet {
                    owner: username.to_string(),
                    currency: currency.clone(),
                    balance: 0,
                    updated_at: now,
                });
        }
        Ok(account)
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

pub struct MemoryUnitOfWork {
    store: MemoryLedgerStore,
    held: BTreeMap<WalletKey, OwnedMutexGuard<()>>,
    deltas: BTreeMap<WalletKey, i64>,
    transactions: Vec<Transaction>,
    entries: Vec<LedgerEntry>,
}

impl MemoryUnitOfWork {
    /// Committed balance, or `None` when the wallet does not exist
    fn committed_balance(&self, key: &WalletKey) -> Option<i64> {
        lock_state(&self.store.state).wallets.get(key).map(|w| w.balance)
    }

    async fn acquire(&mut self, key: &WalletKey) {
        if self.held.contains_key(key) {
            return;
        }
        let guard = self.store.row_lock(key).lock_owned().await;
        self.held.insert(key.clone(), guard);
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_wallet(&mut self, key: &WalletKey) -> Result<Wallet, LedgerError> {
        if self.committed_balance(key).is_none() {
            return Err(LedgerError::NotFound(format!("wallet {key}")));
        }
        self.acquire(key).await;

        let mut wallet = self.store.wallet(key).await?;
        wallet.balance = wallet
            .balance
            .saturating_add(self.deltas.get(key).copied().unwrap_or(0));
        Ok(wallet)
    }

    async fn apply_delta(&mut self, key: &WalletKey, delta: i64) -> Result<u64, LedgerError> {
        if self.committed_balance(key).is_none() {
            return Ok(0);
        }
        self.acquire(key).await;

        // same failure Postgres reports for a BIGINT overflow
        let out_of_range = || LedgerError::Store(format!("bigint out of range for wallet {key}"));
        let staged = self.deltas.get(key).copied().unwrap_or(0);
        let next_staged = staged.checked_add(delta).ok_or_else(out_of_range)?;
        let next = self
            .committed_balance(key)
            .unwrap_or(0)
            .checked_add(next_staged)
            .ok_or_else(out_of_range)?;
        if delta < 0 && next < 0 {
            return Ok(0);
        }
        self.deltas.insert(key.clone(), next_staged);
        Ok(1)
    }

    async fn insert_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let duplicate = lock_state(&self.store.state).has_transaction(&tx.uid)
            || self.transactions.iter().any(|t| t.uid == tx.uid);
        if duplicate {
            return Err(LedgerError::Conflict(format!("transaction {} exists", tx.uid)));
        }
        self.transactions.push(tx.clone());
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if entry.direction == Direction::Credit
            && self.store.faults.credit_entry.load(Ordering::SeqCst)
        {
            return Err(LedgerError::Store("injected entry failure".to_string()));
        }
        let known = self.transactions.iter().any(|t| t.uid == entry.tx_uid)
            || lock_state(&self.store.state).has_transaction(&entry.tx_uid);
        if !known {
            return Err(LedgerError::Store(format!(
                "entry references unknown transaction {}",
                entry.tx_uid
            )));
        }
        self.entries.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        if self.store.faults.commit.load(Ordering::SeqCst) {
            return Err(LedgerError::CommitFailed("injected".to_string()));
        }

        let this = *self;
        let now = Utc::now();
        {
            let mut state = lock_state(&this.store.state);
            for (key, delta) in &this.deltas {
                if let Some(wallet) = state.wallets.get_mut(key) {
                    wallet.balance = wallet.balance.saturating_add(*delta);
                    wallet.updated_at = now;
                }
            }
            state.transactions.extend(this.transactions);
            state.entries.extend(this.entries);
        }
        // row locks are released only after the writes are visible
        drop(this.held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        // staged writes and row locks are discarded either way
        if self.store.faults.rollback.load(Ordering::SeqCst) {
            return Err(LedgerError::Store("injected rollback failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(owner: &str) -> WalletKey {
        WalletKey::new(owner, "SGD")
    }

    fn deposit_tx(uid: &str, owner: &str, amount: i64) -> Transaction {
        Transaction {
            uid: uid.to_string(),
            reference: None,
            tx_type: TxType::Deposit,
            initiated_by: owner.to_string(),
            status: TxStatus::Completed,
            amount,
            currency: "SGD".to_string(),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let store = MemoryLedgerStore::new();
        store.seed_wallet(&key("a"), 0);

        let mut uow = store.begin().await.unwrap();
        uow.insert_transaction(&deposit_tx("01A", "a", 10)).await.unwrap();
        assert_eq!(uow.apply_delta(&key("a"), 10).await.unwrap(), 1);
        assert_eq!(store.wallet(&key("a")).await.unwrap().balance, 0);
        assert_eq!(store.transaction_count(), 0);

        uow.commit().await.unwrap();
        assert_eq!(store.wallet(&key("a")).await.unwrap().balance, 10);
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_discards_writes() {
        let store = MemoryLedgerStore::new();
        store.seed_wallet(&key("a"), 5);

        {
            let mut uow = store.begin().await.unwrap();
            uow.apply_delta(&key("a"), 10).await.unwrap();
        }
        assert_eq!(store.wallet(&key("a")).await.unwrap().balance, 5);

        // lock released by the drop
        let mut uow = store.begin().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), uow.lock_wallet(&key("a")))
            .await
            .expect("lock should be free")
            .unwrap();
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_unit_of_work() {
        let store = MemoryLedgerStore::new();
        store.seed_wallet(&key("a"), 5);

        let mut first = store.begin().await.unwrap();
        first.lock_wallet(&key("a")).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), second.apply_delta(&key("a"), 1)).await;
        assert!(blocked.is_err(), "second writer must wait for the row lock");

        first.rollback().await.unwrap();
        let rows = tokio::time::timeout(Duration::from_secs(1), second.apply_delta(&key("a"), 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_guard_sees_staged_deltas() {
        let store = MemoryLedgerStore::new();
        store.seed_wallet(&key("a"), 10);

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.apply_delta(&key("a"), -10).await.unwrap(), 1);
        assert_eq!(uow.apply_delta(&key("a"), -1).await.unwrap(), 0);
        assert_eq!(uow.lock_wallet(&key("a")).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_seed_balance_replays() {
        let store = MemoryLedgerStore::new();
        store.seed_wallet(&key("a"), 100);
        assert_eq!(store.replayed_balance(&key("a")), 100);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_create_account_conflict() {
        let store = MemoryLedgerStore::new();
        let currencies = vec!["SGD".to_string(), "JPY".to_string()];
        let account = store.create_account("alice", "hash", &currencies).await.unwrap();
        assert_eq!(account.id, 1);

        let err = store.create_account("alice", "hash", &currencies).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        let wallets = store.wallets("alice", &currencies).await.unwrap();
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0].currency, "JPY");
        assert!(wallets.iter().all(|w| w.balance == 0));
    }

    #[tokio::test]
    async fn test_entry_requires_transaction() {
        let store = MemoryLedgerStore::new();
        let mut uow = store.begin().await.unwrap();
        let err = uow
            .insert_entry(&LedgerEntry {
                tx_uid: "missing".to_string(),
                owner: "a".to_string(),
                currency: "SGD".to_string(),
                amount: 1,
                direction: Direction::Debit,
                created_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));
    }

    #[tokio::test]
    async fn test_credit_overflow_is_store_error() {
        let store = MemoryLedgerStore::new();
        store.seed_wallet(&key("a"), 100);

        let mut uow = store.begin().await.unwrap();
        let err = uow.apply_delta(&key("a"), i64::MAX).await.unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));

        // accumulated staged deltas overflow as well
        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.apply_delta(&key("a"), i64::MAX - 100).await.unwrap(), 1);
        let err = uow.apply_delta(&key("a"), 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));
        drop(uow);

        assert_eq!(store.wallet(&key("a")).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_rollback_fault_still_releases_locks() {
        let store = MemoryLedgerStore::new();
        store.seed_wallet(&key("a"), 5);
        store.fail_rollback(true);

        let mut uow = store.begin().await.unwrap();
        uow.apply_delta(&key("a"), 10).await.unwrap();
        assert!(uow.rollback().await.is_err());
        assert_eq!(store.wallet(&key("a")).await.unwrap().balance, 5);

        let mut uow = store.begin().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), uow.lock_wallet(&key("a")))
            .await
            .expect("lock should be free")
            .unwrap();
    }
}
