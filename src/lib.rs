//! chainport: a proof-of-work blockchain node with an HTTP control-plane
//!
//! This crate provides:
//! - A JSON REST API to inspect the ledger, submit transactions and manage peers
//! - A server-rendered HTML block explorer
//! - Proof of Work consensus with difficulty re-targeting
//! - ECDSA digital signatures (secp256k1) over a UTXO transaction model
//! - WebSocket peer-to-peer sync of blocks, transactions and peers
//! - JSON persistence of the chain and the node wallet
//!
//! # Example
//!
//! ```rust,no_run
//! use chainport::api::{create_router, ApiState};
//! use chainport::network::PeerNetwork;
//! use chainport::node::Node;
//! use chainport::storage::StorageConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let node = Arc::new(Node::open(StorageConfig::default(), 16)?);
//! let network = PeerNetwork::new(node.clone(), 4000);
//! network.spawn_relay();
//!
//! let state = ApiState::new(node.clone(), node.clone(), Arc::new(network), node, 4000);
//! let router = create_router(state);
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod explorer;
pub mod mining;
pub mod network;
pub mod node;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use core::{Block, Blockchain, Transaction, BLOCK_REWARD, DEFAULT_DIFFICULTY};
pub use crypto::KeyPair;
pub use mining::{Mempool, Miner};
pub use network::PeerNetwork;
pub use node::Node;
pub use storage::Storage;
pub use wallet::Wallet;
