//! Message codec
//!
//! Reversible transform between plaintext message content and its at-rest
//! form: ChaCha20-Poly1305 with a fresh random nonce per call, the nonce
//! prepended to the ciphertext, the whole encoded as standard base64.
//!
//! A key that is not exactly [`KEY_SIZE`] bytes is a pass-through: the input
//! comes back unchanged and a warning is logged. Storage then holds plaintext,
//! so deployments must configure a proper key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;
use tracing::warn;

use crate::error::CryptoError;

/// Required key length in bytes
pub const KEY_SIZE: usize = 32;

/// Nonce size for ChaCha20-Poly1305
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for ChaCha20-Poly1305
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under `key` into printable text.
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<String, CryptoError> {
    if key.len() != KEY_SIZE {
        warn!(
            "Encryption key is {} bytes, expected {}; storing plaintext",
            key.len(),
            KEY_SIZE
        );
        return Ok(plaintext.to_string());
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::Encryption)?;

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| CryptoError::Encryption)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(sealed))
}

/// Decrypt text produced by [`encrypt`] under the same `key`.
pub fn decrypt(encoded: &str, key: &[u8]) -> Result<String, CryptoError> {
    if key.len() != KEY_SIZE {
        warn!(
            "Encryption key is {} bytes, expected {}; returning input unchanged",
            key.len(),
            KEY_SIZE
        );
        return Ok(encoded.to_string());
    }

    let sealed = STANDARD.decode(encoded)?;

    // Nonce plus at least the tag
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Authentication);
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher =
        ChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::Authentication)?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Authentication)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::Authentication)
}

/// Generate a random key suitable for [`encrypt`]
pub fn generate_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    fn random_plaintext(rng: &mut impl Rng) -> String {
        let len = rng.gen_range(0..256);
        rng.sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    #[test]
    fn test_round_trip_random_plaintexts() {
        let key = generate_key();
        let mut rng = rand::thread_rng();

        for _ in 0..1000 {
            let plaintext = random_plaintext(&mut rng);
            let sealed = encrypt(&plaintext, &key).unwrap();
            assert_eq!(decrypt(&sealed, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_round_trip_unicode() {
        let key = generate_key();
        let plaintext = "привет, мир 👋";
        let sealed = encrypt(plaintext, &key).unwrap();
        assert_eq!(decrypt(&sealed, &key).unwrap(), plaintext);
    }

    #[test]
    fn test_ciphertexts_differ_for_same_plaintext() {
        let key = generate_key();
        let a = encrypt("hello", &key).unwrap();
        let b = encrypt("hello", &key).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, "hello");
    }

    #[test]
    fn test_short_key_is_pass_through() {
        let short = b"too-short";
        assert_eq!(encrypt("hello", short).unwrap(), "hello");
        assert_eq!(decrypt("hello", short).unwrap(), "hello");

        let long = [7u8; 33];
        assert_eq!(encrypt("hello", &long).unwrap(), "hello");
        assert_eq!(decrypt("not base64 at all!", &long).unwrap(), "not base64 at all!");
    }

    #[test]
    fn test_decrypt_rejects_invalid_base64() {
        let key = generate_key();
        let err = decrypt("%%% not base64 %%%", &key).unwrap_err();
        assert!(matches!(err, CryptoError::Decode(_)));
    }

    #[test]
    fn test_decrypt_rejects_truncated_input() {
        let key = generate_key();
        let short = STANDARD.encode([0u8; NONCE_SIZE + TAG_SIZE - 1]);
        let err = decrypt(&short, &key).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn test_decrypt_rejects_tampered_ciphertext() {
        let key = generate_key();
        let sealed = encrypt("hello", &key).unwrap();

        let mut bytes = STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = STANDARD.encode(bytes);

        let err = decrypt(&tampered, &key).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let sealed = encrypt("hello", &generate_key()).unwrap();
        let err = decrypt(&sealed, &generate_key()).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }
}
