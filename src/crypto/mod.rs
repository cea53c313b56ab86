//! Cryptographic primitives
//!
//! - SHA-256 hashing and proof-of-work checks
//! - secp256k1 key pairs and signatures
//! - Base58Check addresses

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, double_sha256_hex, is_lower_hex, meets_difficulty, sha256};
pub use keys::{
    is_valid_address, public_key_from_hex, public_key_to_address, verify_signature, KeyError,
    KeyPair,
};
