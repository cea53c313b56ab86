//! UTXO transactions
//!
//! A transaction consumes previously unspent outputs and creates new ones.
//! Every input is signed by the key that owns the output it spends.

use crate::crypto::{public_key_from_hex, public_key_to_address, sha256, verify_signature, KeyPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid signature on input {0}")]
    InvalidSignature(usize),
    #[error("Input {0} is not signed")]
    Unsigned(usize),
    #[error("Transaction has no outputs")]
    NoOutputs,
    #[error("Output amounts overflow")]
    AmountOverflow,
    #[error("Transaction id does not match its contents")]
    IdMismatch,
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}

/// Reference to an output being spent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub tx_id: String,
    pub output_index: u32,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
}

impl TransactionInput {
    pub fn spending(utxo: &UTXO) -> Self {
        Self {
            tx_id: utxo.tx_id.clone(),
            output_index: utxo.output_index,
            signature: String::new(),
            public_key: String::new(),
        }
    }

    /// Address of the key that signed this input
    pub fn signer_address(&self) -> Option<String> {
        public_key_from_hex(&self.public_key)
            .ok()
            .map(|key| public_key_to_address(&key))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    pub address: String,
    pub amount: u64,
}

/// An output that no block has spent yet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UTXO {
    pub tx_id: String,
    pub output_index: u32,
    pub amount: u64,
    #[serde(skip)]
    pub address: String,
}

impl UTXO {
    /// Key used by the UTXO set
    pub fn outpoint(&self) -> String {
        outpoint(&self.tx_id, self.output_index)
    }
}

pub fn outpoint(tx_id: &str, output_index: u32) -> String {
    format!("{}:{}", tx_id, output_index)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    #[serde(default)]
    pub is_coinbase: bool,
}

impl Transaction {
    /// Build an unsigned transaction
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        let mut tx = Self {
            id: String::new(),
            timestamp: Utc::now(),
            inputs,
            outputs,
            is_coinbase: false,
        };
        tx.id = tx.calculate_hash();
        tx
    }

    /// Block reward paid to `recipient`; the height keeps coinbase ids unique
    pub fn coinbase(recipient: &str, amount: u64, block_height: u64) -> Self {
        let mut tx = Self {
            id: String::new(),
            timestamp: Utc::now(),
            inputs: vec![TransactionInput {
                tx_id: "0".repeat(64),
                output_index: block_height as u32,
                signature: String::new(),
                public_key: String::new(),
            }],
            outputs: vec![TransactionOutput {
                address: recipient.to_string(),
                amount,
            }],
            is_coinbase: true,
        };
        tx.id = tx.calculate_hash();
        tx
    }

    /// Digest covering everything except signatures
    pub fn signing_data(&self) -> Vec<u8> {
        let spent: Vec<String> = self
            .inputs
            .iter()
            .map(|i| outpoint(&i.tx_id, i.output_index))
            .collect();
        let data = format!(
            "{:?}{:?}{}{}",
            spent,
            self.outputs,
            self.timestamp.timestamp_micros(),
            self.is_coinbase
        );
        sha256(data.as_bytes())
    }

    /// Transaction id: hash of the signed contents
    pub fn calculate_hash(&self) -> String {
        let signatures: Vec<&str> = self.inputs.iter().map(|i| i.signature.as_str()).collect();
        let mut data = self.signing_data();
        data.extend_from_slice(format!("{:?}", signatures).as_bytes());
        hex::encode(sha256(&data))
    }

    /// Sign every input with `key_pair`
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        let digest = self.signing_data();
        let signature = hex::encode(key_pair.sign(&digest)?);
        let public_key = key_pair.public_key_hex();

        for input in &mut self.inputs {
            input.signature = signature.clone();
            input.public_key = public_key.clone();
        }

        self.id = self.calculate_hash();
        Ok(())
    }

    /// Structural and signature checks that need no chain state
    pub fn verify(&self) -> Result<(), TransactionError> {
        if self.outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        if self.id != self.calculate_hash() {
            return Err(TransactionError::IdMismatch);
        }
        if self.total_output().is_none() {
            return Err(TransactionError::AmountOverflow);
        }
        if self.is_coinbase {
            return Ok(());
        }

        let digest = self.signing_data();
        for (index, input) in self.inputs.iter().enumerate() {
            if input.signature.is_empty() || input.public_key.is_empty() {
                return Err(TransactionError::Unsigned(index));
            }
            let public_key = public_key_from_hex(&input.public_key)?;
            let signature = hex::decode(&input.signature)
                .map_err(|_| TransactionError::InvalidSignature(index))?;
            if !verify_signature(&public_key, &digest, &signature)? {
                return Err(TransactionError::InvalidSignature(index));
            }
        }
        Ok(())
    }

    /// Sum of the outputs, or `None` if it does not fit in a `u64`
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, o| total.checked_add(o.amount))
    }

    /// Whether this transaction spends the given output
    pub fn spends(&self, tx_id: &str, output_index: u32) -> bool {
        !self.is_coinbase
            && self
                .inputs
                .iter()
                .any(|i| i.tx_id == tx_id && i.output_index == output_index)
    }
}
