//! # Keccak Helpers
//!
//! Hashing and address derivation shared by signing and verification code.

use crate::entities::{Address, Hash};
use k256::ecdsa::VerifyingKey;
use sha3::{Digest, Keccak256};

/// Keccak256 hash function.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    Hash::new(hash)
}

/// Derive an Ethereum address from a secp256k1 public key.
///
/// Address = keccak256(uncompressed pubkey without 0x04 prefix)\[12:\]
#[must_use]
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let pubkey_bytes = public_key.to_encoded_point(false);
    let hash = keccak256(&pubkey_bytes.as_bytes()[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash.as_bytes()[12..]);
    Address::new(address)
}
