//! Wallet ledger
//!
//! - [`store`]: unit-of-work capability traits
//! - [`balance`]: the guarded balance mutator
//! - [`orchestrator`]: deposit, withdraw and deadlock-free transfer
//! - [`postgres`] / [`memory`]: store implementations

pub mod balance;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod postgres;
pub mod store;
pub mod types;

pub use error::LedgerError;
pub use memory::MemoryLedgerStore;
pub use orchestrator::{Movement, TransferOrchestrator, TransferOrder};
pub use postgres::PgLedgerStore;
pub use store::{LedgerStore, UnitOfWork, with_unit_of_work};
pub use types::{
    Account, Direction, LedgerEntry, Page, PageRequest, Transaction, TxHistory, TxStatus, TxType,
    Wallet, WalletKey,
};
