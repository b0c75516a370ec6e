//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode bytes as URL-safe base64 without padding
pub fn to_base64url(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Fixed-length key derived from untrusted client input.
///
/// Client supplied identifiers (device fingerprints and the like) can be
/// arbitrarily long. Counters are keyed by their digest instead.
pub fn digest_key(namespace: &str, raw: &str) -> String {
    let digest = sha256(&[namespace.as_bytes(), &[0u8][..], raw.as_bytes()].concat());
    format!("{namespace}{}", to_base64url(&digest))
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
