//! Request fingerprinting for diagnostics

use sha2::{Digest, Sha256};

use crate::message::Request;

/// Compute SHA-256 fingerprint of a request
///
/// The fingerprint includes:
/// 1. Method (uppercase normalized)
/// 2. URI (normalized)
/// 3. Headers (sorted, normalized)
/// 4. Body
#[must_use]
pub fn fingerprint_request(request: &Request) -> [u8; 32] {
    let mut hasher = Sha256::new();

    // 1. Method (uppercase normalized)
    let method = request.method.to_uppercase();
    hasher.update((method.len() as u32).to_le_bytes());
    hasher.update(method.as_bytes());

    // 2. URI (normalized)
    let uri = normalize_path(&request.uri);
    hasher.update((uri.len() as u32).to_le_bytes());
    hasher.update(uri.as_bytes());

    // 3. Headers (sorted, normalized)
    let mut headers: Vec<(String, &str)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value.trim()))
        .collect();
    headers.sort();
    for (name, value) in &headers {
        hasher.update((name.len() as u32).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update((value.len() as u32).to_le_bytes());
        hasher.update(value.as_bytes());
    }

    // 4. Body
    hasher.update((request.body.len() as u32).to_le_bytes());
    hasher.update(&request.body);

    hasher.finalize().into()
}

/// Short hex digest of a body, used in mismatch reports
#[must_use]
pub fn body_digest(body: &[u8]) -> String {
    let hash: [u8; 32] = Sha256::digest(body).into();
    format!("{} bytes, sha256 {}", body.len(), short_hex(&hash))
}

/// First eight bytes of a hash as hex
#[must_use]
pub fn short_hex(hash: &[u8; 32]) -> String {
    hex::encode(&hash[..8])
}

/// Normalize a URL path
pub(crate) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();

    if trimmed.is_empty() || !trimmed.starts_with('/') {
        format!("/{trimmed}")
    } else {
        trimmed.to_string()
    }
}
