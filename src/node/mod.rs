//! The node's shared state
//!
//! `Node` owns the chain, the mempool and the wallet, and is the concrete
//! ledger, mempool and wallet service behind both HTTP surfaces. Peer sync
//! goes through the inherent methods at the bottom of this file.
//!
//! Locks are always taken chain first, mempool second. Anything that moves
//! the chain tip holds `append_lock` so a block mined against a snapshot of
//! the tip is still valid when it is committed.

use crate::api::{LedgerService, MempoolService, WalletService};
use crate::core::{
    Block, Blockchain, BlockchainError, ChainEvent, EventBus, LedgerStatus, Transaction, UTXO,
};
use crate::crypto::is_valid_address;
use crate::mining::{Mempool, MempoolError, Miner};
use crate::storage::{Storage, StorageConfig, StorageError};
use crate::wallet::{Wallet, WalletError};
use async_trait::async_trait;
use log::{error, info};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
}

pub struct Node {
    blockchain: RwLock<Blockchain>,
    mempool: RwLock<Mempool>,
    wallet: Wallet,
    miner: Miner,
    storage: Option<Storage>,
    events: EventBus,
    append_lock: Mutex<()>,
}

impl Node {
    /// Assemble a node from parts; `storage` of `None` keeps it in memory
    pub fn new(blockchain: Blockchain, wallet: Wallet, storage: Option<Storage>) -> Self {
        let miner = Miner::new(&wallet.address());
        Self {
            blockchain: RwLock::new(blockchain),
            mempool: RwLock::new(Mempool::new()),
            wallet,
            miner,
            storage,
            events: EventBus::new(),
            append_lock: Mutex::new(()),
        }
    }

    /// Open the node stored in `config.data_dir`, creating it on first run
    pub fn open(config: StorageConfig, difficulty: u32) -> Result<Self, NodeError> {
        let storage = Storage::new(config)?;
        let wallet = Wallet::load_or_create(&storage.wallet_path())?;
        let blockchain = storage.load_or_create(difficulty)?;
        Ok(Self::new(blockchain, wallet, Some(storage)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    pub async fn save(&self) -> Result<(), StorageError> {
        match &self.storage {
            Some(storage) => storage.save(&*self.blockchain.read().await),
            None => Ok(()),
        }
    }

    fn persist(&self, chain: &Blockchain) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save(chain) {
                error!("Failed to save blockchain: {}", e);
            }
        }
    }

    /// Outputs of `address` not yet claimed by a pending transaction
    fn spendable(chain: &Blockchain, mempool: &Mempool, address: &str) -> Vec<UTXO> {
        chain
            .utxos_for_address(address)
            .into_iter()
            .filter(|utxo| !mempool.is_spent(&utxo.tx_id, utxo.output_index))
            .collect()
    }

    pub async fn newest_block(&self) -> Block {
        self.blockchain.read().await.latest_block().clone()
    }

    pub async fn height(&self) -> u64 {
        self.blockchain.read().await.height()
    }

    /// Append a block announced by a peer
    pub async fn add_peer_block(&self, block: Block) -> Result<(), BlockchainError> {
        let _guard = self.append_lock.lock().await;
        let mut chain = self.blockchain.write().await;
        chain.add_block(block.clone())?;

        let included: Vec<String> = block.transactions.iter().map(|tx| tx.id.clone()).collect();
        let mut mempool = self.mempool.write().await;
        mempool.remove_transactions(&included);
        mempool.remove_conflicting(&chain);
        drop(mempool);

        info!("Accepted peer block {} at height {}", block.hash, block.height);
        self.persist(&chain);
        Ok(())
    }

    /// Adopt a peer's chain, given newest first, if it is valid and not shorter
    ///
    /// Returns whether the local chain was replaced.
    pub async fn replace_chain(&self, mut blocks: Vec<Block>) -> Result<bool, BlockchainError> {
        blocks.reverse();
        let candidate = Blockchain::from_blocks(blocks)?;

        let _guard = self.append_lock.lock().await;
        let mut chain = self.blockchain.write().await;
        if candidate.blocks.len() < chain.blocks.len()
            || candidate.latest_block().hash == chain.latest_block().hash
        {
            return Ok(false);
        }

        info!(
            "Replacing chain at height {} with peer chain at height {}",
            chain.height(),
            candidate.height()
        );
        *chain = candidate;
        self.mempool.write().await.remove_conflicting(&chain);
        self.persist(&chain);
        Ok(true)
    }

    /// Queue a transaction relayed by a peer
    ///
    /// Already-known valid transactions are accepted silently. Nothing is
    /// published, so relayed transactions are not echoed back out.
    pub async fn add_peer_transaction(&self, tx: Transaction) -> Result<(), MempoolError> {
        let chain = self.blockchain.read().await;
        chain
            .validate_pending(&tx)
            .map_err(|e| MempoolError::InvalidTransaction(e.to_string()))?;

        let mut mempool = self.mempool.write().await;
        if mempool.contains(&tx.id) {
            return Ok(());
        }
        mempool.add(tx)
    }
}

#[async_trait]
impl LedgerService for Node {
    async fn status(&self) -> LedgerStatus {
        self.blockchain.read().await.status()
    }

    async fn blocks(&self) -> Vec<Block> {
        self.blockchain.read().await.blocks_newest_first()
    }

    async fn append_block(&self) -> Result<Block, BlockchainError> {
        let _guard = self.append_lock.lock().await;

        let (tip_height, tip_hash, difficulty) = {
            let chain = self.blockchain.read().await;
            (
                chain.height(),
                chain.latest_block().hash.clone(),
                chain.difficulty,
            )
        };
        let transactions = self.mempool.read().await.transactions();

        let miner = Miner::new(&self.miner.address);
        let (block, _stats) = tokio::task::spawn_blocking(move || {
            miner.mine_block_detached(tip_height, tip_hash, difficulty, transactions)
        })
        .await
        .map_err(|e| BlockchainError::MiningFailed(e.to_string()))?;

        let mut chain = self.blockchain.write().await;
        chain.add_block(block.clone())?;

        let included: Vec<String> = block.transactions.iter().map(|tx| tx.id.clone()).collect();
        self.mempool.write().await.remove_transactions(&included);

        self.persist(&chain);
        drop(chain);

        self.events.publish(ChainEvent::BlockAppended(block.clone()));
        Ok(block)
    }

    async fn find_block(&self, hash: &str) -> Result<Block, BlockchainError> {
        self.blockchain
            .read()
            .await
            .get_block_by_hash(hash)
            .cloned()
            .ok_or_else(|| BlockchainError::BlockNotFound(hash.to_string()))
    }

    async fn utxos_for_address(&self, address: &str) -> Vec<UTXO> {
        let chain = self.blockchain.read().await;
        let mempool = self.mempool.read().await;
        Self::spendable(&chain, &mempool, address)
    }

    async fn balance_for_address(&self, address: &str) -> u64 {
        self.utxos_for_address(address)
            .await
            .iter()
            .fold(0, |total, utxo| total.saturating_add(utxo.amount))
    }
}

#[async_trait]
impl MempoolService for Node {
    async fn transactions(&self) -> Vec<Transaction> {
        self.mempool.read().await.transactions()
    }

    async fn add_transaction(&self, to: &str, amount: i64) -> Result<Transaction, MempoolError> {
        if amount <= 0 {
            return Err(MempoolError::InvalidAmount(amount));
        }
        if !is_valid_address(to) {
            return Err(MempoolError::InvalidAddress(to.to_string()));
        }

        let chain = self.blockchain.read().await;
        let mut mempool = self.mempool.write().await;
        let utxos = Self::spendable(&chain, &mempool, &self.wallet.address());
        let tx = self.wallet.create_transaction(to, amount as u64, &utxos)?;
        mempool.add(tx.clone())?;
        drop(mempool);
        drop(chain);

        info!("Queued transaction {} paying {} to {}", tx.id, amount, to);
        self.events.publish(ChainEvent::TransactionAdded(tx.clone()));
        Ok(tx)
    }
}

#[async_trait]
impl WalletService for Node {
    async fn own_address(&self) -> String {
        self.wallet.address()
    }
}
