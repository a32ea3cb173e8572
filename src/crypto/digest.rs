//! SHA-256 digest computation.

use crate::NodelockError;
use sha2::{Digest, Sha256};

/// Compute SHA-256 of the UTF-8 bytes of `input` and return lowercase hex.
///
/// Used for hardware fingerprints and license integrity hashes.
pub fn sha256_hex(input: &str) -> Result<String, NodelockError> {
    if input.is_empty() {
        return Err(NodelockError::InvalidArgument(
            "hash input cannot be empty".to_string(),
        ));
    }
    Ok(hex::encode(Sha256::digest(input.as_bytes())))
}

/// Build the integrity hash input for a license record.
///
/// Format: `<license_id>|<hardware_id>|<LICENSE_TYPE>|<product_salt>`
pub fn integrity_input(
    license_id: &str,
    hardware_id: &str,
    license_type: &str,
    product_salt: &str,
) -> String {
    format!(
        "{}|{}|{}|{}",
        license_id, hardware_id, license_type, product_salt
    )
}

/// Truncate an id to its first 16 characters for log output.
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(16).map_or(id, |(end, _)| &id[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hello_world() {
        let digest = sha256_hex("Hello, World!").unwrap();
        assert_eq!(
            digest,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_sha256_is_deterministic() {
        assert_eq!(sha256_hex("abc123").unwrap(), sha256_hex("abc123").unwrap());
    }

    #[test]
    fn test_sha256_distinct_inputs() {
        let inputs = ["a", "b", "abc", "abd", "abc ", "ABC", "0", "00"];
        let mut seen = std::collections::HashSet::new();
        for input in inputs {
            assert!(seen.insert(sha256_hex(input).unwrap()));
        }
    }

    #[test]
    fn test_sha256_lowercase_hex() {
        let digest = sha256_hex("Hello, World!").unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_sha256_empty_rejected() {
        assert!(matches!(
            sha256_hex(""),
            Err(NodelockError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_integrity_input_format() {
        let input = integrity_input("id-1", "hw", "STANDARD", "salt");
        assert_eq!(input, "id-1|hw|STANDARD|salt");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef0123"), "0123456789abcdef");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_short_id_non_ascii() {
        // Byte 16 falls inside a two-byte character.
        let id = format!("a{}", "é".repeat(20));
        let short = short_id(&id);
        assert_eq!(short.chars().count(), 16);
        assert!(id.starts_with(short));
    }
}
