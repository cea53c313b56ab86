//! The node's own wallet
//!
//! One key pair per node, persisted as hex so the receiving address
//! survives restarts.

use crate::core::{Transaction, TransactionError, TransactionInput, TransactionOutput, UTXO};
use crate::crypto::KeyPair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}

/// On-disk form of the wallet
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    private_key_hex: String,
    address: String,
}

pub struct Wallet {
    key_pair: KeyPair,
}

impl Wallet {
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        Ok(Self {
            key_pair: KeyPair::from_private_key_hex(private_key_hex)?,
        })
    }

    /// Restore the wallet at `path`, creating and saving one if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self, WalletError> {
        if path.exists() {
            let wallet = Self::load(path)?;
            log::info!("Loaded wallet {}", wallet.address());
            return Ok(wallet);
        }

        let wallet = Self::new();
        wallet.save(path)?;
        log::info!("Created wallet {}", wallet.address());
        Ok(wallet)
    }

    pub fn address(&self) -> String {
        self.key_pair.address()
    }

    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Build and sign a payment of `amount` to `recipient` from `utxos`
    ///
    /// Outputs are consumed in the given order until the amount is covered.
    /// Any surplus comes back to this wallet as change.
    pub fn create_transaction(
        &self,
        recipient: &str,
        amount: u64,
        utxos: &[UTXO],
    ) -> Result<Transaction, WalletError> {
        let balance = utxos
            .iter()
            .fold(0u64, |total, u| total.saturating_add(u.amount));
        if balance < amount {
            return Err(WalletError::InsufficientFunds {
                have: balance,
                need: amount,
            });
        }

        let mut inputs = Vec::new();
        let mut selected = 0u64;
        for utxo in utxos {
            if selected >= amount {
                break;
            }
            inputs.push(TransactionInput::spending(utxo));
            selected = selected.saturating_add(utxo.amount);
        }

        let mut outputs = vec![TransactionOutput {
            address: recipient.to_string(),
            amount,
        }];
        if selected > amount {
            outputs.push(TransactionOutput {
                address: self.address(),
                amount: selected - amount,
            });
        }

        let mut tx = Transaction::new(inputs, outputs);
        tx.sign(&self.key_pair)?;
        Ok(tx)
    }

    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = WalletData {
            private_key_hex: self.key_pair.private_key_hex(),
            address: self.address(),
        };
        fs::write(path, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let data: WalletData = serde_json::from_str(&fs::read_to_string(path)?)?;
        Self::from_private_key(&data.private_key_hex)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}
