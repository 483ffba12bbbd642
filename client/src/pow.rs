use num_bigint::BigUint;
use sha2::{Digest, Sha256};

/// Digest summarizing the distinct candidate keys produced while scanning a
/// range: SHA-256 of each key's UTF-8 text, digests summed as big-endian
/// unsigned integers, rendered as lowercase hex without padding or prefix.
///
/// Order-independent (it is a sum) and deliberately free of deduplication;
/// the parser already keeps the candidate set distinct.
pub fn compute_sha256_sum<S: AsRef<str>>(keys: &[S]) -> String {
    let mut total = BigUint::default();
    for key in keys {
        let digest = Sha256::digest(key.as_ref().as_bytes());
        total += BigUint::from_bytes_be(&digest);
    }
    format!("{total:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_sums_to_zero() {
        let keys: [&str; 0] = [];
        assert_eq!(compute_sha256_sum(&keys), "0");
    }

    #[test]
    fn deterministic_and_order_independent() {
        let a = ["0".repeat(63) + "1", "0".repeat(63) + "2", "0".repeat(63) + "3"];
        let b = [a[2].clone(), a[0].clone(), a[1].clone()];
        let first = compute_sha256_sum(&a);
        assert_eq!(first, compute_sha256_sum(&a));
        assert_eq!(first, compute_sha256_sum(&b));
    }

    #[test]
    fn duplicates_accumulate() {
        let once = compute_sha256_sum(&["ab"]);
        let twice = compute_sha256_sum(&["ab", "ab"]);
        assert_ne!(once, twice);
    }

    #[test]
    fn renders_plain_lowercase_hex() {
        let digest = compute_sha256_sum(&["ab"]);
        assert!(!digest.starts_with("0x"));
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(!digest.starts_with('0'));
    }
}
