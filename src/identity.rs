//! Identity token derivation for rate-limit keying.

use sha2::{Digest, Sha256};

/// Length in hex characters of a well-formed identity token.
pub const IDENTITY_TOKEN_LEN: usize = 64;

/// Derives a stable, non-reversible identity token from a raw client
/// address. The raw address is never stored or logged; only the salted
/// digest is used as a counter-store key.
pub fn hash_identity(raw_address: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_address.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A well-formed token is exactly 64 lowercase hex characters. Anything
/// else means the digest step went wrong and the caller must refuse the
/// request rather than skip rate limiting.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == IDENTITY_TOKEN_LEN && token.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = hash_identity("203.0.113.9", "pepper");
        let b = hash_identity("203.0.113.9", "pepper");
        assert_eq!(a, b);
        assert!(is_well_formed(&a));
    }

    #[test]
    fn test_salt_changes_token() {
        let a = hash_identity("203.0.113.9", "pepper");
        let b = hash_identity("203.0.113.9", "other");
        assert_ne!(a, b);
    }

    #[test]
    fn test_well_formed_check() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("abc"));
        assert!(is_well_formed(&"a".repeat(64)));
        assert!(!is_well_formed(&"z".repeat(64)));
    }
}
