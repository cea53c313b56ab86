//! Blockchain persistence layer
//!
//! The chain is stored as a single JSON document. Loading replays every
//! block through validation, so a tampered file is rejected rather than
//! served.

use crate::core::{Block, Blockchain, BlockchainError};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Stored chain rejected: {0}")]
    InvalidChain(#[from] BlockchainError),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub blockchain_file: String,
    pub wallet_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".chainport"),
            blockchain_file: "blockchain.json".to_string(),
            wallet_file: "wallet.json".to_string(),
        }
    }
}

/// Only the blocks are read back; everything else is derived from them
#[derive(Deserialize)]
struct StoredChain {
    blocks: Vec<Block>,
}

/// Blockchain storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    fn blockchain_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.blockchain_file)
    }

    pub fn wallet_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.wallet_file)
    }

    /// Save the blockchain to disk
    pub fn save(&self, blockchain: &Blockchain) -> Result<(), StorageError> {
        // Write to temporary file first
        let temp_path = self
            .config
            .data_dir
            .join(format!("{}.tmp", self.config.blockchain_file));
        let file = fs::File::create(&temp_path)?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, blockchain)?;

        // Atomic rename
        fs::rename(&temp_path, self.blockchain_path())?;

        log::debug!("Saved chain at height {}", blockchain.height());
        Ok(())
    }

    /// Load and re-validate the stored chain
    pub fn load(&self) -> Result<Blockchain, StorageError> {
        let file = fs::File::open(self.blockchain_path())?;
        let reader = BufReader::new(file);

        let stored: StoredChain = serde_json::from_reader(reader)?;
        Ok(Blockchain::from_blocks(stored.blocks)?)
    }

    /// Load the stored chain, or start a fresh one at `difficulty`
    pub fn load_or_create(&self, difficulty: u32) -> Result<Blockchain, StorageError> {
        if self.exists() {
            let chain = self.load()?;
            log::info!("Loaded chain at height {}", chain.height());
            return Ok(chain);
        }

        let chain = Blockchain::with_difficulty(difficulty);
        self.save(&chain)?;
        log::info!("Created genesis block {}", chain.latest_block().hash);
        Ok(chain)
    }

    /// Check if a saved blockchain exists
    pub fn exists(&self) -> bool {
        self.blockchain_path().exists()
    }
}
