//! Wallet module for the node's signing key

pub mod wallet;

pub use wallet::{Wallet, WalletError};
