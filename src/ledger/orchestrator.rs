//! Transfer orchestrator
//!
//! Deposit, withdraw and transfer, each as one unit of work. Transfers lock
//! both wallets in sorted key order before touching either balance, so two
//! transfers over the same pair of wallets always request locks in the same
//! order whichever direction they move money.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{info, warn};
use ulid::Generator;

use super::balance;
use super::error::LedgerError;
use super::store::{LedgerStore, with_unit_of_work};
use super::types::{
    Direction, LedgerEntry, Page, PageRequest, Transaction, TxHistory, TxStatus, TxType, Wallet,
    WalletKey,
};

/// Deposit or withdraw against the owner's own wallet
#[derive(Debug, Clone)]
pub struct Movement {
    pub owner: String,
    pub currency: String,
    pub amount: i64,
    pub reference: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct TransferOrder {
    pub sender: String,
    pub receiver: String,
    pub currency: String,
    pub amount: i64,
    pub reference: Option<String>,
    pub metadata: serde_json::Value,
}

pub struct TransferOrchestrator {
    store: Arc<dyn LedgerStore>,
    /// Monotonic so that uid order equals creation order
    uids: Mutex<Generator>,
}

impl TransferOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            uids: Mutex::new(Generator::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    fn next_uid(&self) -> Result<String, LedgerError> {
        let mut generator = self
            .uids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        generator
            .generate()
            .map(|uid| uid.to_string())
            .map_err(|e| LedgerError::Fatal(format!("uid generation: {e}")))
    }

    fn new_transaction(
        &self,
        tx_type: TxType,
        initiated_by: &str,
        currency: &str,
        amount: i64,
        reference: Option<String>,
        metadata: serde_json::Value,
    ) -> Result<Transaction, LedgerError> {
        Ok(Transaction {
            uid: self.next_uid()?,
            reference,
            tx_type,
            initiated_by: initiated_by.to_string(),
            status: TxStatus::Completed,
            amount,
            currency: currency.to_string(),
            metadata,
            created_at: Utc::now(),
        })
    }

    pub async fn deposit(&self, movement: Movement) -> Result<Transaction, LedgerError> {
        self.single_wallet(TxType::Deposit, movement).await
    }

    pub async fn withdraw(&self, movement: Movement) -> Result<Transaction, LedgerError> {
        self.single_wallet(TxType::Withdraw, movement).await
    }

    /// Deposit and withdraw touch one wallet; the guarded update's implicit
    /// row lock is enough, no pre-lock is taken.
    async fn single_wallet(
        &self,
        tx_type: TxType,
        movement: Movement,
    ) -> Result<Transaction, LedgerError> {
        validate_amount(movement.amount)?;
        validate_party("owner", &movement.owner)?;
        validate_party("currency", &movement.currency)?;

        let direction = match tx_type {
            TxType::Withdraw => Direction::Debit,
            _ => Direction::Credit,
        };
        let key = WalletKey::new(movement.owner.as_str(), movement.currency.as_str());
        let tx = self.new_transaction(
            tx_type,
            &movement.owner,
            &movement.currency,
            movement.amount,
            movement.reference,
            movement.metadata,
        )?;
        let entry = LedgerEntry {
            tx_uid: tx.uid.clone(),
            owner: key.owner.clone(),
            currency: key.currency.clone(),
            amount: tx.amount,
            direction,
            created_at: tx.created_at,
        };
        let delta = direction.signed(tx.amount);

        let result = with_unit_of_work(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                uow.insert_transaction(&tx).await?;
                balance::adjust(uow, &key, delta).await?;
                uow.insert_entry(&entry).await?;
                Ok(tx)
            })
        })
        .await;

        match &result {
            Ok(tx) => info!(
                tx_uid = %tx.uid,
                tx_type = %tx.tx_type,
                owner = %tx.initiated_by,
                currency = %tx.currency,
                amount = tx.amount,
                "Transaction completed"
            ),
            Err(e) => warn!(tx_type = %tx_type, owner = %movement.owner, error = %e, "Transaction failed"),
        }
        result
    }

    pub async fn transfer(&self, order: TransferOrder) -> Result<Transaction, LedgerError> {
        validate_amount(order.amount)?;
        validate_party("sender", &order.sender)?;
        validate_party("receiver", &order.receiver)?;
        validate_party("currency", &order.currency)?;
        if order.sender == order.receiver {
            return Err(LedgerError::validation("sender and receiver must differ"));
        }

        let sender = WalletKey::new(order.sender.as_str(), order.currency.as_str());
        let receiver = WalletKey::new(order.receiver.as_str(), order.currency.as_str());
        let lock_order = lock_order(&sender, &receiver);

        let tx = self.new_transaction(
            TxType::Transfer,
            &order.sender,
            &order.currency,
            order.amount,
            order.reference,
            order.metadata,
        )?;
        let debit = LedgerEntry {
            tx_uid: tx.uid.clone(),
            owner: sender.owner.clone(),
            currency: sender.currency.clone(),
            amount: tx.amount,
            direction: Direction::Debit,
            created_at: tx.created_at,
        };
        let credit = LedgerEntry {
            owner: receiver.owner.clone(),
            direction: Direction::Credit,
            ..debit.clone()
        };
        let amount = tx.amount;

        let result = with_unit_of_work(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                for key in &lock_order {
                    uow.lock_wallet(key).await?;
                }
                uow.insert_transaction(&tx).await?;
                balance::adjust(uow, &sender, -amount).await?;
                uow.insert_entry(&debit).await?;
                balance::adjust(uow, &receiver, amount).await?;
                uow.insert_entry(&credit).await?;
                Ok(tx)
            })
        })
        .await;

        match &result {
            Ok(tx) => info!(
                tx_uid = %tx.uid,
                sender = %order.sender,
                receiver = %order.receiver,
                currency = %tx.currency,
                amount = tx.amount,
                "Transfer completed"
            ),
            Err(e) => warn!(
                sender = %order.sender,
                receiver = %order.receiver,
                error = %e,
                "Transfer failed"
            ),
        }
        result
    }

    pub async fn balances(&self, owner: &str, currencies: &[String]) -> Result<Vec<Wallet>, LedgerError> {
        self.store.wallets(owner, currencies).await
    }

    pub async fn history(
        &self,
        owner: &str,
        currency: &str,
        page: &PageRequest,
    ) -> Result<Page<TxHistory>, LedgerError> {
        self.store.history(&WalletKey::new(owner, currency), page).await
    }

    /// A transaction is visible to its initiator only
    pub async fn transaction(&self, owner: &str, uid: &str) -> Result<Transaction, LedgerError> {
        let tx = self.store.transaction(uid).await?;
        if tx.initiated_by != owner {
            return Err(LedgerError::NotFound(format!("transaction {uid}")));
        }
        Ok(tx)
    }

    pub async fn transactions_by_reference(
        &self,
        owner: &str,
        reference: &str,
        page: &PageRequest,
    ) -> Result<Page<Transaction>, LedgerError> {
        self.store
            .transactions_by_reference(owner, reference, page)
            .await
    }
}

/// Both wallets of a transfer in global lock order
fn lock_order(a: &WalletKey, b: &WalletKey) -> [WalletKey; 2] {
    let mut keys = [a.clone(), b.clone()];
    keys.sort();
    keys
}

fn validate_amount(amount: i64) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::validation("amount must be positive"));
    }
    Ok(())
}

fn validate_party(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(format!("{field} is mandatory")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedgerStore;
    use std::time::Duration;

    fn setup(wallets: &[(&str, i64)]) -> (Arc<MemoryLedgerStore>, TransferOrchestrator) {
        let store = Arc::new(MemoryLedgerStore::new());
        for (owner, balance) in wallets {
            store.seed_wallet(&WalletKey::new(*owner, "SGD"), *balance);
        }
        let orchestrator = TransferOrchestrator::new(store.clone());
        (store, orchestrator)
    }

    fn movement(owner: &str, amount: i64) -> Movement {
        Movement {
            owner: owner.to_string(),
            currency: "SGD".to_string(),
            amount,
            reference: Some("ref-1".to_string()),
            metadata: serde_json::json!({"note": "test"}),
        }
    }

    fn order(sender: &str, receiver: &str, amount: i64) -> TransferOrder {
        TransferOrder {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            currency: "SGD".to_string(),
            amount,
            reference: None,
            metadata: serde_json::Value::Null,
        }
    }

    async fn balance(store: &MemoryLedgerStore, owner: &str) -> i64 {
        store.wallet(&WalletKey::new(owner, "SGD")).await.unwrap().balance
    }

    async fn assert_replays(store: &MemoryLedgerStore, owners: &[&str]) {
        for owner in owners {
            let key = WalletKey::new(*owner, "SGD");
            let stored = store.wallet(&key).await.unwrap().balance;
            assert_eq!(store.replayed_balance(&key), stored, "replay mismatch for {owner}");
        }
    }

    #[tokio::test]
    async fn test_scenario() {
        let (store, orch) = setup(&[("alice", 100), ("bob", 30)]);

        let tx = orch.deposit(movement("alice", 50)).await.unwrap();
        assert_eq!(tx.tx_type, TxType::Deposit);
        assert_eq!(tx.status, TxStatus::Completed);
        assert_eq!(balance(&store, "alice").await, 150);
        let entries = store.entries(&tx.uid).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].direction, Direction::Credit);
        assert_eq!(entries[0].amount, 50);

        let err = orch.withdraw(movement("alice", 200)).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds);
        assert_eq!(balance(&store, "alice").await, 150);

        let tx = orch.transfer(order("alice", "bob", 150)).await.unwrap();
        assert_eq!(balance(&store, "alice").await, 0);
        assert_eq!(balance(&store, "bob").await, 180);
        let entries = store.entries(&tx.uid).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].direction, Direction::Debit);
        assert_eq!(entries[0].owner, "alice");
        assert_eq!(entries[1].direction, Direction::Credit);
        assert_eq!(entries[1].owner, "bob");
        assert_eq!(entries[0].amount, entries[1].amount);

        assert_replays(&store, &["alice", "bob"]).await;
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_leaves_no_rows() {
        let (store, orch) = setup(&[("alice", 10)]);
        let before = (store.transaction_count(), store.entry_count());

        let err = orch.withdraw(movement("alice", 11)).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds);
        assert_eq!(balance(&store, "alice").await, 10);
        assert_eq!((store.transaction_count(), store.entry_count()), before);
    }

    #[tokio::test]
    async fn test_transfer_all_or_nothing() {
        let (store, orch) = setup(&[("alice", 100), ("bob", 0)]);
        store.fail_credit_entries(true);
        let before = (store.transaction_count(), store.entry_count());

        let err = orch.transfer(order("alice", "bob", 40)).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(balance(&store, "alice").await, 100);
        assert_eq!(balance(&store, "bob").await, 0);
        assert_eq!((store.transaction_count(), store.entry_count()), before);

        store.fail_credit_entries(false);
        orch.transfer(order("alice", "bob", 40)).await.unwrap();
        assert_eq!(store.entry_count(), before.1 + 2);
        assert_replays(&store, &["alice", "bob"]).await;
    }

    #[tokio::test]
    async fn test_transfer_to_missing_wallet() {
        let (store, orch) = setup(&[("alice", 100)]);
        let err = orch.transfer(order("alice", "nobody", 10)).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert_eq!(balance(&store, "alice").await, 100);
    }

    #[tokio::test]
    async fn test_transfer_validation() {
        let (store, orch) = setup(&[("alice", 100)]);
        for bad in [
            order("alice", "alice", 10),
            order("alice", "bob", 0),
            order("alice", "bob", -5),
            order("", "bob", 5),
        ] {
            let err = orch.transfer(bad).await.unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)), "{err}");
        }
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_begin_and_commit_failures() {
        let (store, orch) = setup(&[("alice", 100)]);

        store.fail_begin(true);
        let err = orch.deposit(movement("alice", 1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::BeginFailed(_)));
        store.fail_begin(false);

        store.fail_commit(true);
        let err = orch.deposit(movement("alice", 1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::CommitFailed(_)));
        store.fail_commit(false);

        assert_eq!(balance(&store, "alice").await, 100);
    }

    #[tokio::test]
    async fn test_uids_are_ordered() {
        let (_store, orch) = setup(&[("alice", 0)]);
        let mut last = String::new();
        for _ in 0..50 {
            let tx = orch.deposit(movement("alice", 1)).await.unwrap();
            assert!(tx.uid > last);
            last = tx.uid;
        }
    }

    #[test]
    fn test_lock_order_ignores_direction() {
        let a = WalletKey::new("alice", "SGD");
        let b = WalletKey::new("bob", "SGD");
        assert_eq!(lock_order(&a, &b), lock_order(&b, &a));
        assert_eq!(lock_order(&b, &a)[0], a);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposite_transfers_do_not_deadlock() {
        // alice can cover every outgoing transfer even before any incoming one lands
        let (store, orch) = setup(&[("alice", 2_000), ("bob", 1_000)]);
        let orch = Arc::new(orch);
        let rounds = 200;

        let mut handles = Vec::new();
        for _ in 0..rounds {
            let o = orch.clone();
            handles.push(tokio::spawn(async move {
                o.transfer(order("alice", "bob", 10)).await
            }));
            let o = orch.clone();
            handles.push(tokio::spawn(async move {
                o.transfer(order("bob", "alice", 5)).await
            }));
        }

        tokio::time::timeout(Duration::from_secs(30), async {
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        })
        .await
        .expect("transfers deadlocked");

        assert_eq!(balance(&store, "alice").await, 2_000 - 5 * rounds);
        assert_eq!(balance(&store, "bob").await, 1_000 + 5 * rounds);
        assert_replays(&store, &["alice", "bob"]).await;
    }

    #[tokio::test]
    async fn test_transaction_visible_to_initiator_only() {
        let (_store, orch) = setup(&[("alice", 100), ("bob", 0)]);
        let tx = orch.transfer(order("alice", "bob", 10)).await.unwrap();

        assert_eq!(orch.transaction("alice", &tx.uid).await.unwrap(), tx);
        assert!(matches!(
            orch.transaction("bob", &tx.uid).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_pagination() {
        let (_store, orch) = setup(&[("alice", 0)]);
        let mut uids = Vec::new();
        for i in 1..=5 {
            uids.push(orch.deposit(movement("alice", i)).await.unwrap().uid);
        }
        uids.reverse();

        let first = orch
            .history("alice", "SGD", &PageRequest::new(2, None))
            .await
            .unwrap();
        assert!(first.has_more);
        assert_eq!(
            first.items.iter().map(|h| h.uid.clone()).collect::<Vec<_>>(),
            uids[..2]
        );

        let rest = orch
            .history("alice", "SGD", &PageRequest::new(10, Some(uids[1].clone())))
            .await
            .unwrap();
        assert!(!rest.has_more);
        assert_eq!(rest.items.len(), 3);
        assert_eq!(rest.items[0].uid, uids[2]);
    }

    #[tokio::test]
    async fn test_transactions_by_reference() {
        let (_store, orch) = setup(&[("alice", 0)]);
        orch.deposit(movement("alice", 1)).await.unwrap();
        orch.deposit(movement("alice", 2)).await.unwrap();
        let mut other = movement("alice", 3);
        other.reference = Some("ref-2".to_string());
        orch.deposit(other).await.unwrap();

        let page = orch
            .transactions_by_reference("alice", "ref-1", &PageRequest::new(10, None))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].amount, 2);
        assert!(!page.has_more);
    }
}
