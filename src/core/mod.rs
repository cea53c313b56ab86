//! Core ledger components
//!
//! - Transactions (UTXO model, secp256k1 signatures)
//! - Blocks (proof of work)
//! - Blockchain (validation, UTXO set, difficulty re-targeting)
//! - Events published on local mutations

pub mod block;
pub mod blockchain;
pub mod events;
pub mod transaction;

pub use block::{Block, GENESIS_PREV_HASH};
pub use blockchain::{
    Blockchain, BlockchainError, LedgerStatus, BLOCK_REWARD, DEFAULT_DIFFICULTY,
    DIFFICULTY_ADJUSTMENT_INTERVAL, MAX_DIFFICULTY, MIN_DIFFICULTY, TARGET_BLOCK_TIME,
};
pub use events::{ChainEvent, EventBus};
pub use transaction::{
    outpoint, Transaction, TransactionError, TransactionInput, TransactionOutput, UTXO,
};
