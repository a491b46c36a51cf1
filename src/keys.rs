//! URL normalization and content-addressed short-key derivation.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use url::Url;

/// Normalizes a long URL for keying: trims surrounding whitespace and
/// lower-cases the host (the parser does this on its own); path and
/// query are left untouched. Returns `None` when the input does not
/// parse as a URL at all.
pub fn normalize_url(input: &str) -> Option<String> {
    let parsed = Url::parse(input.trim()).ok()?;
    Some(parsed.to_string())
}

/// Derives the storage key for a normalized URL: the first `length` hex
/// characters of its SHA-256 digest. Purely a function of its input,
/// which makes the registry content-addressed and self-deduplicating
/// without a secondary index.
pub fn derive_key(normalized_url: &str, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..length.min(digest.len())].to_string()
}

/// Path IDs are URL-safe and at least 5 characters. Derived keys always
/// pass; the check guards hand-crafted paths.
pub fn is_valid_id(id: &str) -> bool {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{5,}$").unwrap());
    re.is_match(id)
}
