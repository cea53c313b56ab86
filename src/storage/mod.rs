//! Storage module for blockchain persistence

pub mod persistence;

pub use persistence::{Storage, StorageConfig, StorageError};
