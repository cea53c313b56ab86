//! Subsystems the control-plane talks to
//!
//! Handlers only ever see these traits. Each call is treated as atomic;
//! implementations own their own locking.

use crate::core::{Block, BlockchainError, LedgerStatus, Transaction, UTXO};
use crate::mining::MempoolError;
use crate::network::PeerError;
use async_trait::async_trait;
use axum::extract::ws::WebSocket;

#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn status(&self) -> LedgerStatus;

    /// Every block, newest first
    async fn blocks(&self) -> Vec<Block>;

    /// Mine the next block from pending transactions and append it
    async fn append_block(&self) -> Result<Block, BlockchainError>;

    /// `BlockchainError::BlockNotFound` when no block has this hash
    async fn find_block(&self, hash: &str) -> Result<Block, BlockchainError>;

    async fn utxos_for_address(&self, address: &str) -> Vec<UTXO>;

    async fn balance_for_address(&self, address: &str) -> u64;
}

#[async_trait]
pub trait MempoolService: Send + Sync {
    /// Pending transactions, oldest first
    async fn transactions(&self) -> Vec<Transaction>;

    /// Pay `amount` to `to` from this node's wallet
    async fn add_transaction(&self, to: &str, amount: i64) -> Result<Transaction, MempoolError>;
}

#[async_trait]
pub trait PeerService: Send + Sync {
    /// Connect to `address:port`, telling it we listen on `self_port`
    ///
    /// Registering a known peer again is a no-op.
    async fn add_peer(&self, address: &str, port: u16, self_port: u16) -> Result<(), PeerError>;

    /// Known peers as sorted `address:port` keys
    async fn peers(&self) -> Vec<String>;

    /// Take over an upgraded socket from a peer that listens on `port`
    async fn accept(&self, socket: WebSocket, address: String, port: u16);
}

#[async_trait]
pub trait WalletService: Send + Sync {
    async fn own_address(&self) -> String;
}
