//! SHA-256 helpers for bearer secrets stored server-side

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of a secret
pub fn sha256_hex(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("{:x}", digest)
}

/// Compare a presented secret against a stored digest.
///
/// The comparison touches every byte so its timing does not depend on where
/// the first mismatch is.
pub fn matches_hash(secret: &str, stored_hash: &str) -> bool {
    let presented = sha256_hex(secret);
    if presented.len() != stored_hash.len() {
        return false;
    }

    presented
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
