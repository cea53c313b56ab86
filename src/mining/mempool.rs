//! Pool of submitted transactions waiting for a block

use crate::core::{Blockchain, Transaction};
use crate::wallet::WalletError;
use std::collections::HashMap;
use thiserror::Error;

/// Rejection reasons, rendered verbatim to clients
#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("Transaction already exists")]
    DuplicateTransaction,
    #[error("Input {0} is already spent by a pending transaction")]
    Conflict(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}

/// Pending transactions in arrival order
#[derive(Debug, Default)]
pub struct Mempool {
    entries: HashMap<String, Transaction>,
    by_time: Vec<String>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `tx` unless it duplicates or double-spends a pending one
    pub fn add(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        if self.entries.contains_key(&tx.id) {
            return Err(MempoolError::DuplicateTransaction);
        }
        if !tx.is_coinbase {
            for input in &tx.inputs {
                if self.is_spent(&input.tx_id, input.output_index) {
                    return Err(MempoolError::Conflict(format!(
                        "{}:{}",
                        input.tx_id, input.output_index
                    )));
                }
            }
        }

        self.by_time.push(tx.id.clone());
        self.entries.insert(tx.id.clone(), tx);
        Ok(())
    }

    /// Whether a pending transaction already spends this output
    pub fn is_spent(&self, tx_id: &str, output_index: u32) -> bool {
        self.entries
            .values()
            .any(|tx| tx.spends(tx_id, output_index))
    }

    /// Pending transactions, oldest first
    pub fn transactions(&self) -> Vec<Transaction> {
        self.by_time
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    pub fn remove_transaction(&mut self, tx_id: &str) -> Option<Transaction> {
        let tx = self.entries.remove(tx_id)?;
        self.by_time.retain(|id| id != tx_id);
        Some(tx)
    }

    pub fn remove_transactions(&mut self, tx_ids: &[String]) {
        for id in tx_ids {
            self.remove_transaction(id);
        }
    }

    /// Drop transactions whose inputs the chain has since spent
    pub fn remove_conflicting(&mut self, blockchain: &Blockchain) {
        let stale: Vec<String> = self
            .entries
            .values()
            .filter(|tx| !blockchain.inputs_unspent(tx))
            .map(|tx| tx.id.clone())
            .collect();

        if !stale.is_empty() {
            log::debug!("Evicting {} stale mempool transactions", stale.len());
        }
        self.remove_transactions(&stale);
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.entries.contains_key(tx_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TransactionInput, TransactionOutput, UTXO};

    fn spend(tx_id: &str, index: u32, amount: u64) -> Transaction {
        let utxo = UTXO {
            tx_id: tx_id.to_string(),
            output_index: index,
            amount,
            address: "owner".to_string(),
        };
        Transaction::new(
            vec![TransactionInput::spending(&utxo)],
            vec![TransactionOutput {
                address: "recipient".to_string(),
                amount,
            }],
        )
    }

    #[test]
    fn test_fifo_order() {
        let mut pool = Mempool::new();
        let first = spend("aa", 0, 1);
        let second = spend("bb", 0, 2);
        pool.add(first.clone()).unwrap();
        pool.add(second.clone()).unwrap();

        let ids: Vec<String> = pool.transactions().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut pool = Mempool::new();
        let tx = spend("aa", 0, 1);
        pool.add(tx.clone()).unwrap();
        assert!(matches!(
            pool.add(tx),
            Err(MempoolError::DuplicateTransaction)
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_double_spend_rejected() {
        let mut pool = Mempool::new();
        pool.add(spend("aa", 0, 1)).unwrap();
        assert!(pool.is_spent("aa", 0));
        assert!(matches!(
            pool.add(spend("aa", 0, 5)),
            Err(MempoolError::Conflict(_))
        ));
    }

    #[test]
    fn test_remove_transactions() {
        let mut pool = Mempool::new();
        let tx = spend("aa", 0, 1);
        pool.add(tx.clone()).unwrap();
        pool.remove_transactions(&[tx.id.clone()]);
        assert!(pool.is_empty());
        assert!(!pool.contains(&tx.id));
        assert!(!pool.is_spent("aa", 0));
    }

    #[test]
    fn test_remove_conflicting_evicts_unknown_inputs() {
        let chain = Blockchain::with_difficulty(4);
        let mut pool = Mempool::new();
        pool.add(spend("ff", 3, 1)).unwrap();

        pool.remove_conflicting(&chain);
        assert!(pool.is_empty());
    }
}
