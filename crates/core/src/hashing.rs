//! Hashing utilities shared by token storage and auto-save deduplication.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data` as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Content hash used for auto-save deduplication.
///
/// Covers the fields that constitute "the content" for change detection:
/// title, body, and excerpt. Field values are length-prefixed so that
/// boundary shifts between fields cannot collide.
pub fn content_hash(title: &str, body: &str, excerpt: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [title, body, excerpt] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
