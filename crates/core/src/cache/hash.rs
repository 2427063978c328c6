//! Memo key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a memoized call.
///
/// The namespace names the memoized function; `args` is its argument list in
/// a stable textual form.
pub fn compute_memo_key(namespace: &str, args: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"\n");
    hasher.update(args.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_memo_key("datasets", "");
        let hash2 = compute_memo_key("datasets", "");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_namespace() {
        let datasets = compute_memo_key("datasets", "");
        let boundaries = compute_memo_key("lga_features", "");
        assert_ne!(datasets, boundaries);
    }

    #[test]
    fn test_hash_different_args() {
        let hash1 = compute_memo_key("datasets", "https://a.example/cases.csv");
        let hash2 = compute_memo_key("datasets", "https://b.example/cases.csv");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_hash_separator_prevents_collisions() {
        assert_ne!(compute_memo_key("ab", "c"), compute_memo_key("a", "bc"));
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_memo_key("datasets", "");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
