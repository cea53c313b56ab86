//! Blocks and proof of work

use crate::core::transaction::Transaction;
use crate::crypto::{double_sha256_hex, is_lower_hex, meets_difficulty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Previous-hash value of the genesis block
pub const GENESIS_PREV_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A mined block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: String,
    pub prev_hash: String,
    pub height: u64,
    /// Required leading zero bits of `hash`
    pub difficulty: u32,
    pub nonce: u64,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create an unmined block
    pub fn new(
        height: u64,
        prev_hash: String,
        transactions: Vec<Transaction>,
        difficulty: u32,
    ) -> Self {
        let mut block = Self {
            hash: String::new(),
            prev_hash,
            height,
            difficulty,
            nonce: 0,
            timestamp: Utc::now(),
            transactions,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Mined genesis block paying nobody
    pub fn genesis(difficulty: u32) -> Self {
        let coinbase = Transaction::coinbase("genesis", 0, 0);
        let mut block = Self::new(0, GENESIS_PREV_HASH.to_string(), vec![coinbase], difficulty);
        block.mine();
        block
    }

    pub fn calculate_hash(&self) -> String {
        let tx_ids: Vec<&str> = self.transactions.iter().map(|tx| tx.id.as_str()).collect();
        let data = format!(
            "{}{}{}{}{}{}",
            self.prev_hash,
            self.height,
            self.difficulty,
            self.nonce,
            self.timestamp.timestamp(),
            tx_ids.concat()
        );
        double_sha256_hex(data.as_bytes())
    }

    /// Search nonces until the hash meets the difficulty; returns attempts
    pub fn mine(&mut self) -> u64 {
        let mut attempts = 0u64;
        loop {
            self.nonce = attempts;
            self.hash = self.calculate_hash();
            attempts += 1;
            if self.is_valid_pow() {
                return attempts;
            }
        }
    }

    pub fn is_valid_pow(&self) -> bool {
        match hex::decode(&self.hash) {
            Ok(bytes) => meets_difficulty(&bytes, self.difficulty),
            Err(_) => false,
        }
    }

    /// Hash is lowercase hex and matches the block contents
    pub fn verify_hash(&self) -> bool {
        is_lower_hex(&self.hash) && self.hash == self.calculate_hash()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase)
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(8);
        assert_eq!(genesis.height, 0);
        assert_eq!(genesis.prev_hash, GENESIS_PREV_HASH);
        assert!(genesis.is_valid_pow());
        assert!(genesis.verify_hash());
        assert!(genesis.coinbase().is_some());
    }

    #[test]
    fn test_block_mining() {
        let transactions = vec![Transaction::coinbase("miner", 50, 1)];
        let mut block = Block::new(1, GENESIS_PREV_HASH.to_string(), transactions, 8);

        let attempts = block.mine();

        assert!(attempts >= 1);
        assert!(block.is_valid_pow());
        assert!(block.verify_hash());
        assert!(is_lower_hex(&block.hash));
    }

    #[test]
    fn test_tampering_breaks_hash() {
        let mut block = Block::genesis(4);
        block.nonce += 1;
        assert!(!block.verify_hash());

        let mut block = Block::genesis(4);
        block.transactions.push(Transaction::coinbase("thief", 50, 0));
        assert!(!block.verify_hash());
    }
}
