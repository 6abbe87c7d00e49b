//! Cache key derivation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a canonical item URL.
///
/// The key is the SHA-256 hex digest of the URL string, so the caller must
/// pass the canonical form for two spellings of one page to share a record.
pub fn compute_cache_key(canonical_url: &str) -> String {
    hex::encode(Sha256::digest(canonical_url.as_bytes()))
}

/// Whether `key` looks like a key produced by [`compute_cache_key`].
pub fn is_valid_key(key: &str) -> bool {
    key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit())
}
