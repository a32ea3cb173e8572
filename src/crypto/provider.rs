//! Pluggable encryption/hash provider.

use crate::crypto::{cipher, digest};
use crate::NodelockError;

/// Symmetric encryption and one-way hashing used by the license engine.
pub trait CryptoProvider: Send + Sync {
    /// Encrypt `plaintext` under `key`. Non-deterministic.
    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String, NodelockError>;

    /// Reverse [`CryptoProvider::encrypt`].
    fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String, NodelockError>;

    /// SHA-256 of `input`, lowercase hex.
    fn hash(&self, input: &str) -> Result<String, NodelockError>;

    /// `length` random bytes, base64-encoded.
    fn generate_secure_key(&self, length: usize) -> Result<String, NodelockError>;
}

/// PBKDF2-SHA256 + AES-256-CBC provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesCryptoProvider;

impl CryptoProvider for AesCryptoProvider {
    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String, NodelockError> {
        cipher::encrypt(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String, NodelockError> {
        cipher::decrypt(ciphertext, key)
    }

    fn hash(&self, input: &str) -> Result<String, NodelockError> {
        digest::sha256_hex(input)
    }

    fn generate_secure_key(&self, length: usize) -> Result<String, NodelockError> {
        cipher::generate_secure_key(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_roundtrip_through_trait_object() {
        let provider: &dyn CryptoProvider = &AesCryptoProvider;
        let sealed = provider.encrypt("payload", "k").unwrap();
        assert_eq!(provider.decrypt(&sealed, "k").unwrap(), "payload");
    }

    #[test]
    fn test_provider_hash_matches_digest() {
        let provider = AesCryptoProvider;
        assert_eq!(
            provider.hash("abc123").unwrap(),
            digest::sha256_hex("abc123").unwrap()
        );
    }
}
