//! The ledger: an append-only chain of blocks plus its UTXO set

use crate::core::block::{Block, GENESIS_PREV_HASH};
use crate::core::transaction::{outpoint, Transaction, UTXO};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Default mining difficulty (number of leading zero bits)
pub const DEFAULT_DIFFICULTY: u32 = 16;

/// Block reward in coins
pub const BLOCK_REWARD: u64 = 50;

/// Number of blocks between difficulty adjustments
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;

/// Target block time in seconds
pub const TARGET_BLOCK_TIME: i64 = 10;

pub const MIN_DIFFICULTY: u32 = 1;
pub const MAX_DIFFICULTY: u32 = 32;

#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Block not found: {0}")]
    BlockNotFound(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Invalid transaction {0}: {1}")]
    InvalidTransaction(String, String),
    #[error("Invalid chain: {0}")]
    InvalidChain(String),
    #[error("Mining task failed: {0}")]
    MiningFailed(String),
}

/// Summary served by `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatus {
    pub newest_hash: String,
    pub height: u64,
    pub current_difficulty: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockchain {
    /// Blocks in chain order, genesis first
    pub blocks: Vec<Block>,
    /// Difficulty the next block must meet
    pub difficulty: u32,
    #[serde(skip)]
    utxo_set: HashMap<String, UTXO>,
}

impl Blockchain {
    /// Fresh chain holding only a mined genesis block
    pub fn with_difficulty(difficulty: u32) -> Self {
        let difficulty = difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        let mut chain = Self {
            blocks: vec![Block::genesis(difficulty)],
            difficulty,
            utxo_set: HashMap::new(),
        };
        chain.rebuild_utxo_set();
        chain
    }

    pub fn new() -> Self {
        Self::with_difficulty(DEFAULT_DIFFICULTY)
    }

    /// Rebuild a chain from blocks in chain order, validating every block
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, BlockchainError> {
        let mut blocks = blocks.into_iter();
        let genesis = blocks
            .next()
            .ok_or_else(|| BlockchainError::InvalidChain("no blocks".to_string()))?;

        if genesis.height != 0
            || genesis.prev_hash != GENESIS_PREV_HASH
            || !genesis.verify_hash()
            || !genesis.is_valid_pow()
        {
            return Err(BlockchainError::InvalidChain(
                "invalid genesis block".to_string(),
            ));
        }

        let mut chain = Self {
            difficulty: genesis.difficulty,
            blocks: vec![genesis],
            utxo_set: HashMap::new(),
        };
        chain.rebuild_utxo_set();

        for block in blocks {
            chain.add_block(block)?;
        }
        Ok(chain)
    }

    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("Blockchain should have at least genesis block")
    }

    pub fn height(&self) -> u64 {
        self.latest_block().height
    }

    pub fn status(&self) -> LedgerStatus {
        LedgerStatus {
            newest_hash: self.latest_block().hash.clone(),
            height: self.height(),
            current_difficulty: self.difficulty,
        }
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    /// All blocks, newest first
    pub fn blocks_newest_first(&self) -> Vec<Block> {
        self.blocks.iter().rev().cloned().collect()
    }

    /// Validate `block` against the tip and append it
    pub fn add_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        self.validate_block(&block)?;
        self.apply_utxos(&block);
        self.blocks.push(block);

        if self.blocks.len() as u64 % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 {
            self.adjust_difficulty();
        }
        Ok(())
    }

    fn validate_block(&self, block: &Block) -> Result<(), BlockchainError> {
        let latest = self.latest_block();

        if block.height != latest.height + 1 {
            return Err(BlockchainError::InvalidBlock(format!(
                "expected height {}, got {}",
                latest.height + 1,
                block.height
            )));
        }
        if block.prev_hash != latest.hash {
            return Err(BlockchainError::InvalidBlock(
                "previous hash does not match the chain tip".to_string(),
            ));
        }
        if block.difficulty != self.difficulty {
            return Err(BlockchainError::InvalidBlock(format!(
                "expected difficulty {}, got {}",
                self.difficulty, block.difficulty
            )));
        }
        if !block.verify_hash() {
            return Err(BlockchainError::InvalidBlock("invalid block hash".to_string()));
        }
        if !block.is_valid_pow() {
            return Err(BlockchainError::InvalidBlock(
                "invalid proof of work".to_string(),
            ));
        }

        self.validate_transactions(block)
    }

    fn validate_transactions(&self, block: &Block) -> Result<(), BlockchainError> {
        let mut spent_in_block = HashSet::new();

        for (position, tx) in block.transactions.iter().enumerate() {
            if tx.is_coinbase {
                tx.verify()
                    .map_err(|e| BlockchainError::InvalidTransaction(tx.id.clone(), e.to_string()))?;
                if position != 0 {
                    return Err(BlockchainError::InvalidTransaction(
                        tx.id.clone(),
                        "coinbase must be the first transaction".to_string(),
                    ));
                }
                // verify() has already rejected overflowing outputs
                let paid = tx.total_output().unwrap_or(u64::MAX);
                if paid > BLOCK_REWARD {
                    return Err(BlockchainError::InvalidTransaction(
                        tx.id.clone(),
                        format!("coinbase pays {} (max {})", paid, BLOCK_REWARD),
                    ));
                }
                continue;
            }

            self.validate_spend(tx, &mut spent_in_block)?;
        }
        Ok(())
    }

    /// Check a non-coinbase transaction against the current UTXO set
    pub fn validate_pending(&self, tx: &Transaction) -> Result<(), BlockchainError> {
        if tx.is_coinbase {
            return Err(BlockchainError::InvalidTransaction(
                tx.id.clone(),
                "coinbase outside a block".to_string(),
            ));
        }
        self.validate_spend(tx, &mut HashSet::new())
    }

    fn validate_spend(
        &self,
        tx: &Transaction,
        spent: &mut HashSet<String>,
    ) -> Result<(), BlockchainError> {
        let invalid = |reason: String| BlockchainError::InvalidTransaction(tx.id.clone(), reason);

        tx.verify().map_err(|e| invalid(e.to_string()))?;

        let mut input_total = 0u64;
        for input in &tx.inputs {
            let key = outpoint(&input.tx_id, input.output_index);
            let utxo = self
                .utxo_set
                .get(&key)
                .ok_or_else(|| invalid(format!("input {} is not unspent", key)))?;
            if input.signer_address().as_deref() != Some(utxo.address.as_str()) {
                return Err(invalid(format!("input {} is not owned by its signer", key)));
            }
            if !spent.insert(key.clone()) {
                return Err(invalid(format!("input {} is spent twice", key)));
            }
            input_total = input_total
                .checked_add(utxo.amount)
                .ok_or_else(|| invalid("input amounts overflow".to_string()))?;
        }

        let output_total = tx
            .total_output()
            .ok_or_else(|| invalid("output amounts overflow".to_string()))?;
        if input_total < output_total {
            return Err(invalid(format!(
                "outputs {} exceed inputs {}",
                output_total, input_total
            )));
        }
        Ok(())
    }

    /// Move the difficulty one bit towards the target block time
    fn adjust_difficulty(&mut self) {
        let window = DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
        if self.blocks.len() < window {
            return;
        }

        let first = &self.blocks[self.blocks.len() - window];
        let time_taken = self
            .latest_block()
            .timestamp
            .signed_duration_since(first.timestamp)
            .num_seconds();
        let expected_time = TARGET_BLOCK_TIME * DIFFICULTY_ADJUSTMENT_INTERVAL as i64;

        let previous = self.difficulty;
        if time_taken < expected_time / 2 {
            self.difficulty = (self.difficulty + 1).min(MAX_DIFFICULTY);
        } else if time_taken > expected_time * 2 {
            self.difficulty = self.difficulty.saturating_sub(1).max(MIN_DIFFICULTY);
        }

        if previous != self.difficulty {
            log::info!(
                "Difficulty adjusted from {} to {} ({}s for {} blocks, expected {}s)",
                previous,
                self.difficulty,
                time_taken,
                window,
                expected_time
            );
        }
    }

    pub fn rebuild_utxo_set(&mut self) {
        self.utxo_set.clear();
        let blocks = std::mem::take(&mut self.blocks);
        for block in &blocks {
            self.apply_utxos(block);
        }
        self.blocks = blocks;
    }

    fn apply_utxos(&mut self, block: &Block) {
        for tx in &block.transactions {
            if !tx.is_coinbase {
                for input in &tx.inputs {
                    self.utxo_set
                        .remove(&outpoint(&input.tx_id, input.output_index));
                }
            }
            for (index, output) in tx.outputs.iter().enumerate() {
                let utxo = UTXO {
                    tx_id: tx.id.clone(),
                    output_index: index as u32,
                    amount: output.amount,
                    address: output.address.clone(),
                };
                self.utxo_set.insert(utxo.outpoint(), utxo);
            }
        }
    }

    pub fn find_utxo(&self, tx_id: &str, output_index: u32) -> Option<&UTXO> {
        self.utxo_set.get(&outpoint(tx_id, output_index))
    }

    /// Unspent outputs owned by `address`, ordered by outpoint
    pub fn utxos_for_address(&self, address: &str) -> Vec<UTXO> {
        let mut utxos: Vec<UTXO> = self
            .utxo_set
            .values()
            .filter(|utxo| utxo.address == address)
            .cloned()
            .collect();
        utxos.sort_by_key(|utxo| utxo.outpoint());
        utxos
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.utxos_for_address(address)
            .iter()
            .fold(0, |total, u| total.saturating_add(u.amount))
    }

    /// Whether every input of `tx` is currently unspent
    pub fn inputs_unspent(&self, tx: &Transaction) -> bool {
        tx.is_coinbase
            || tx
                .inputs
                .iter()
                .all(|i| self.find_utxo(&i.tx_id, i.output_index).is_some())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}
