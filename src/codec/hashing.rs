//! Bitcoin-compatible hashing functions
//!
//! Implements the double SHA256 hashing used for block identity and payload
//! checksums, plus the hash display convention: hashes travel over the wire
//! as raw little-endian bytes and render as byte-reversed lowercase hex.

use sha2::{Digest, Sha256};

/// A 32-byte hash in wire order (little-endian)
pub type Hash = [u8; 32];

/// The all-zero hash, used for `hash_stop` and the genesis parent
pub const ZERO_HASH: Hash = [0u8; 32];

/// Calculate Bitcoin double SHA256 hash
///
/// This is the standard Bitcoin hashing algorithm used for:
/// - Block hashes
/// - Transaction hashes
/// - Envelope payload checksums
pub fn double_sha256(data: &[u8]) -> Hash {
    let first_hash = Sha256::digest(data);
    let second_hash = Sha256::digest(first_hash);

    let mut result = [0u8; 32];
    result.copy_from_slice(&second_hash);
    result
}

/// Calculate single SHA256 hash
pub fn sha256(data: &[u8]) -> Hash {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// Calculate RIPEMD160 hash
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    use ripemd::Ripemd160;
    let hash = Ripemd160::digest(data);
    let mut result = [0u8; 20];
    result.copy_from_slice(&hash);
    result
}

/// Calculate Bitcoin address hash (SHA256 followed by RIPEMD160)
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha256_hash = sha256(data);
    ripemd160(&sha256_hash)
}

/// Format a wire-order hash as its canonical 64-char hex representation
/// (byte-reversed, lowercase)
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse a canonical 64-char hex hash into wire order
pub fn hash_from_hex(s: &str) -> anyhow::Result<Hash> {
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        anyhow::bail!("expected 32 hash bytes, got {}", bytes.len());
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    hash.reverse();
    Ok(hash)
}
