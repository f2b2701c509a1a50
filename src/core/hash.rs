// Hashing utilities

use crate::core::{Canonical, Digest256};
use sha2::{Digest, Sha256};

/// Single SHA256 hash
pub fn sha256(data: &[u8]) -> Digest256 {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    Digest256::new(result)
}

/// SHA256 rendered as 64 lowercase hex characters
pub fn sha256_hex(data: &[u8]) -> String {
    sha256(data).to_hex()
}

/// Hash(Canonicalize(entity))
pub fn hash_of<T: Canonical + ?Sized>(entity: &T) -> Digest256 {
    sha256(&entity.canonical_bytes())
}
