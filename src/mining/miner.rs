//! Block assembly and proof-of-work search

use crate::core::{Block, Transaction, BLOCK_REWARD};
use log::info;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct MiningStats {
    pub hash_attempts: u64,
    pub time_ms: u128,
}

/// Builds blocks that pay the reward to `address`
pub struct Miner {
    pub address: String,
}

impl Miner {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }

    /// Mine the block following `tip_height` without touching the chain
    ///
    /// CPU-bound. The caller commits the result with the chain's write lock.
    pub fn mine_block_detached(
        &self,
        tip_height: u64,
        tip_hash: String,
        difficulty: u32,
        transactions: Vec<Transaction>,
    ) -> (Block, MiningStats) {
        let start = Instant::now();
        let height = tip_height + 1;

        let mut all_transactions = vec![Transaction::coinbase(&self.address, BLOCK_REWARD, height)];
        all_transactions.extend(transactions);

        let mut block = Block::new(height, tip_hash, all_transactions, difficulty);
        info!("Mining block {} with difficulty {}...", height, difficulty);

        let attempts = block.mine();
        let elapsed = start.elapsed().as_millis();
        info!(
            "Block {} mined in {}ms ({} attempts): {}",
            height, elapsed, attempts, block.hash
        );

        (
            block,
            MiningStats {
                hash_attempts: attempts,
                time_ms: elapsed,
            },
        )
    }
}
