//! Block production and the pending-transaction pool

pub mod mempool;
pub mod miner;

pub use mempool::{Mempool, MempoolError};
pub use miner::{Miner, MiningStats};
