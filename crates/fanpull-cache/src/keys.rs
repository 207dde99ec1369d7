//! Cache key derivation.
//!
//! The raw key is a JSON array: `["GET","<url>"]`, or
//! `["POST","<url>","<sha256(body) hex>"]` when a POST carries a body. The
//! hash key is the SHA-256 of the raw key, hex encoded, and doubles as the
//! on-disk file stem.

use sha2::{Digest, Sha256};

/// Length of a hash key in hex characters.
pub const HASH_KEY_LEN: usize = 64;

/// Build the canonical raw key for a request.
pub fn build_raw_key(method: &str, url: &str, body: Option<&str>) -> String {
    let method = if method.is_empty() {
        "GET".to_string()
    } else {
        method.to_ascii_uppercase()
    };

    let mut parts = vec![method, url.to_string()];
    if parts[0] == "POST" {
        if let Some(body) = body {
            parts.push(sha256_hex(body.as_bytes()));
        }
    }

    // A Vec<String> always serializes.
    serde_json::to_string(&parts).unwrap_or_default()
}

/// Hash a raw key into its fixed-length storage address.
pub fn build_hash_key(raw_key: &str) -> String {
    sha256_hex(raw_key.as_bytes())
}

/// File name for a hash key.
pub(crate) fn file_name(hash_key: &str) -> String {
    format!("{}.cache", hash_key)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
