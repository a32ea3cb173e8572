//! Password-based AES-256-CBC sealing of opaque strings.
//!
//! Wire format: `base64(salt[16] || iv[16] || ciphertext)`.
//! The AES key is derived from the password with PBKDF2-HMAC-SHA256.

use crate::NodelockError;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// IV length in bytes (one AES block).
pub const IV_LEN: usize = 16;

const KEY_LEN: usize = 32;
const BLOCK_LEN: usize = 16;

/// Derive a 256-bit AES key from a password and salt. Wiped on drop.
fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out[..]);
    out
}

/// Fill a buffer from the OS CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Encrypt `plaintext` under `password` with fresh salt and IV.
pub fn encrypt(plaintext: &str, password: &str) -> Result<String, NodelockError> {
    if plaintext.is_empty() {
        return Err(NodelockError::InvalidArgument(
            "plaintext cannot be empty".to_string(),
        ));
    }
    if password.is_empty() {
        return Err(NodelockError::InvalidArgument(
            "key cannot be empty".to_string(),
        ));
    }

    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt);
    let ciphertext = Aes256CbcEnc::new_from_slices(&key[..], &iv)
        .map_err(|_| NodelockError::Crypto)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut sealed = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(sealed))
}

/// Decrypt a string produced by [`encrypt`].
///
/// Every failure after argument checks is reported as `Crypto` so a wrong
/// password cannot be told apart from a tampered ciphertext.
pub fn decrypt(sealed: &str, password: &str) -> Result<String, NodelockError> {
    if sealed.is_empty() {
        return Err(NodelockError::InvalidArgument(
            "ciphertext cannot be empty".to_string(),
        ));
    }
    if password.is_empty() {
        return Err(NodelockError::InvalidArgument(
            "key cannot be empty".to_string(),
        ));
    }

    let bytes = STANDARD
        .decode(sealed.trim())
        .map_err(|_| NodelockError::Crypto)?;

    let body_len = bytes
        .len()
        .checked_sub(SALT_LEN + IV_LEN)
        .ok_or(NodelockError::Crypto)?;
    if body_len == 0 || body_len % BLOCK_LEN != 0 {
        return Err(NodelockError::Crypto);
    }

    let (salt, rest) = bytes.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let key = derive_key(password, salt);
    let plaintext = Aes256CbcDec::new_from_slices(&key[..], iv)
        .map_err(|_| NodelockError::Crypto)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| NodelockError::Crypto)?;

    String::from_utf8(plaintext).map_err(|_| NodelockError::Crypto)
}

/// Generate `length` random bytes, base64-encoded.
pub fn generate_secure_key(length: usize) -> Result<String, NodelockError> {
    if length == 0 {
        return Err(NodelockError::InvalidArgument(
            "key length must be greater than zero".to_string(),
        ));
    }
    Ok(STANDARD.encode(random_bytes(length)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "test-master-key";

    #[test]
    fn test_roundtrip() {
        let long = "a".repeat(100);
        for plaintext in ["x", "hello world", "STANDARD-1-10-2030-01-01", "ñandú ✓", long.as_str()] {
            let sealed = encrypt(plaintext, KEY).unwrap();
            assert_eq!(decrypt(&sealed, KEY).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_block_sized_plaintext_roundtrip() {
        // Exactly one block gains a full padding block.
        let plaintext = "0123456789abcdef";
        let sealed = encrypt(plaintext, KEY).unwrap();
        let raw = STANDARD.decode(&sealed).unwrap();
        assert_eq!(raw.len(), SALT_LEN + IV_LEN + 32);
        assert_eq!(decrypt(&sealed, KEY).unwrap(), plaintext);
    }

    #[test]
    fn test_encrypt_is_non_deterministic() {
        let a = encrypt("same input", KEY).unwrap();
        let b = encrypt("same input", KEY).unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt(&a, KEY).unwrap(), "same input");
        assert_eq!(decrypt(&b, KEY).unwrap(), "same input");
    }

    #[test]
    fn test_wrong_key_fails_without_detail() {
        let sealed = encrypt("secret payload text", KEY).unwrap();
        // A wrong key may occasionally yield valid padding; then UTF-8 or the
        // caller's comparison fails. Either way the result is never the plaintext.
        match decrypt(&sealed, "other-key") {
            Err(e) => assert_eq!(e, NodelockError::Crypto),
            Ok(p) => assert_ne!(p, "secret payload text"),
        }
    }

    #[test]
    fn test_invalid_base64() {
        assert_eq!(decrypt("not base64 !!!", KEY), Err(NodelockError::Crypto));
    }

    #[test]
    fn test_too_short() {
        let short = STANDARD.encode([0u8; 32]);
        assert_eq!(decrypt(&short, KEY), Err(NodelockError::Crypto));
        let shorter = STANDARD.encode([0u8; 5]);
        assert_eq!(decrypt(&shorter, KEY), Err(NodelockError::Crypto));
    }

    #[test]
    fn test_unaligned_ciphertext() {
        let unaligned = STANDARD.encode([7u8; 32 + 17]);
        assert_eq!(decrypt(&unaligned, KEY), Err(NodelockError::Crypto));
    }

    #[test]
    fn test_empty_arguments() {
        assert!(matches!(encrypt("", KEY), Err(NodelockError::InvalidArgument(_))));
        assert!(matches!(encrypt("x", ""), Err(NodelockError::InvalidArgument(_))));
        assert!(matches!(decrypt("", KEY), Err(NodelockError::InvalidArgument(_))));
        assert!(matches!(decrypt("abcd", ""), Err(NodelockError::InvalidArgument(_))));
    }

    #[test]
    fn test_generate_secure_key() {
        let a = generate_secure_key(32).unwrap();
        let b = generate_secure_key(32).unwrap();
        assert_ne!(a, b);
        assert_eq!(STANDARD.decode(&a).unwrap().len(), 32);
        assert!(matches!(
            generate_secure_key(0),
            Err(NodelockError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_derived_key_is_deterministic_per_salt() {
        let salt = [7u8; SALT_LEN];
        let first: Zeroizing<[u8; KEY_LEN]> = derive_key(KEY, &salt);
        assert_eq!(*first, *derive_key(KEY, &salt));
        assert_ne!(*first, *derive_key(KEY, &[8u8; SALT_LEN]));
        assert_ne!(*first, [0u8; KEY_LEN]);
    }
}
