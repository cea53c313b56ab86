//! secp256k1 keys and Base58Check addresses
//!
//! An address is `Base58Check(0x00 || RIPEMD160(SHA256(pubkey)))`, the same
//! layout as a Bitcoin P2PKH address.

use rand::rngs::OsRng;
use ripemd::{Digest, Ripemd160};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{double_sha256, sha256};

/// Address version byte
const ADDRESS_VERSION: u8 = 0x00;

/// Version byte + 20-byte key hash + 4-byte checksum
const ADDRESS_LEN: usize = 25;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A secp256k1 key pair
#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Restore a key pair from a hex-encoded secret key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Compressed public key as hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn address(&self) -> String {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte digest, returning the compact signature
    pub fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
        let message = Message::from_digest_slice(&to_digest(digest))?;
        let signature = Secp256k1::new().sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_compact().to_vec())
    }
}

/// Hash anything that is not already a 32-byte digest
fn to_digest(data: &[u8]) -> Vec<u8> {
    if data.len() == 32 {
        data.to_vec()
    } else {
        sha256(data)
    }
}

/// Derive the Base58Check address of a public key
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    let key_hash = Ripemd160::digest(sha256(&public_key.serialize()));

    let mut payload = Vec::with_capacity(ADDRESS_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(&key_hash);
    let checksum = double_sha256(&payload);
    payload.extend_from_slice(&checksum[..4]);

    bs58::encode(payload).into_string()
}

/// Check that `address` decodes as a versioned Base58Check key hash
pub fn is_valid_address(address: &str) -> bool {
    let Ok(bytes) = bs58::decode(address).into_vec() else {
        return false;
    };
    if bytes.len() != ADDRESS_LEN || bytes[0] != ADDRESS_VERSION {
        return false;
    }
    let (payload, checksum) = bytes.split_at(ADDRESS_LEN - 4);
    double_sha256(payload)[..4] == *checksum
}

pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Verify a compact signature over `digest`
pub fn verify_signature(
    public_key: &PublicKey,
    digest: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let message = Message::from_digest_slice(&to_digest(digest))?;
    let signature = Signature::from_compact(signature).map_err(|_| KeyError::InvalidSignature)?;
    Ok(Secp256k1::new()
        .verify_ecdsa(&message, &signature, public_key)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let digest = sha256(b"spend output 0");

        let signature = kp.sign(&digest).unwrap();
        let public_key = public_key_from_hex(&kp.public_key_hex()).unwrap();
        assert!(verify_signature(&public_key, &digest, &signature).unwrap());

        let other = sha256(b"spend output 1");
        assert!(!verify_signature(&public_key, &other, &signature).unwrap());
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::from_private_key_hex(&kp1.private_key_hex()).unwrap();
        assert_eq!(kp1.address(), kp2.address());
        assert!(KeyPair::from_private_key_hex("not-hex").is_err());
    }

    #[test]
    fn test_address_validation() {
        let address = KeyPair::generate().address();
        assert!(address.starts_with('1'));
        assert!(is_valid_address(&address));

        let mut tampered = address.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '2' { '3' } else { '2' });
        assert!(!is_valid_address(&tampered));

        assert!(!is_valid_address("127.0.0.1"));
        assert!(!is_valid_address(""));
    }
}
