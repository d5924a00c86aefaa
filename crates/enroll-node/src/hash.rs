//! SHA-256 fingerprints via `ring::digest`.

use ring::digest::{digest, SHA256};

/// Compute SHA-256 of raw bytes (certificate or public key DER).
///
/// Returns lowercase hex-encoded digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data).as_ref())
}
