//! Encryption for dotenv files.
//!
//! The key file holds a base64 encoded 32 byte key. Encrypted env files hold
//! base64(`nonce (12 bytes) || ciphertext`).

use base64ct::{Base64, Encoding};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::{RngCore, rngs::OsRng};
use std::{fs, path::Path};

use super::ConfigError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const AAD: &[u8] = b"msdss-users-dotenv";

/// Generate a new random key, base64 encoded.
#[must_use]
pub fn generate_key() -> String {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    Base64::encode_string(&key)
}

/// Read and validate a key file.
///
/// # Errors
/// Returns an error if the file cannot be read or does not hold a 32 byte key.
pub fn read_key(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let encoded = fs::read_to_string(path)?;
    let key = Base64::decode_vec(encoded.trim()).map_err(|e| ConfigError::InvalidKey {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if key.len() != KEY_LEN {
        return Err(ConfigError::InvalidKey {
            path: path.to_path_buf(),
            reason: format!("expected {KEY_LEN} bytes, got {}", key.len()),
        });
    }

    Ok(key)
}

/// Encrypt `plaintext` and return the base64 encoded `nonce || ciphertext`.
///
/// # Errors
/// Returns an error if the key has the wrong length or encryption fails.
#[allow(deprecated)]
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<String, ConfigError> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: AAD,
            },
        )
        .map_err(|e| ConfigError::Crypto(format!("encryption failure: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);

    Ok(Base64::encode_string(&out))
}

/// Decrypt data produced by [`encrypt`].
///
/// # Errors
/// Returns an error if the data is not valid base64, is too short, or fails
/// authentication under `key`.
#[allow(deprecated)]
pub fn decrypt(key: &[u8], encoded: &str) -> Result<Vec<u8>, ConfigError> {
    let data = Base64::decode_vec(encoded.trim())
        .map_err(|e| ConfigError::Crypto(format!("invalid base64: {e}")))?;

    if data.len() < NONCE_LEN {
        return Err(ConfigError::Crypto("invalid ciphertext length".to_string()));
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = cipher(key)?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: AAD,
            },
        )
        .map_err(|e| ConfigError::Crypto(format!("decryption failure: {e}")))
}

#[allow(deprecated)]
fn cipher(key: &[u8]) -> Result<ChaCha20Poly1305, ConfigError> {
    if key.len() != KEY_LEN {
        return Err(ConfigError::Crypto(format!(
            "expected a {KEY_LEN} byte key, got {}",
            key.len()
        )));
    }
    Ok(ChaCha20Poly1305::new(Key::from_slice(key)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_decodes_to_32_bytes() {
        let key = Base64::decode_vec(&generate_key()).unwrap();
        assert_eq!(key.len(), KEY_LEN);
    }

    #[test]
    fn decrypt_recovers_plaintext() {
        let key = Base64::decode_vec(&generate_key()).unwrap();
        let sealed = encrypt(&key, b"MSDSS_USERS_SECRET=abc").unwrap();
        assert_eq!(decrypt(&key, &sealed).unwrap(), b"MSDSS_USERS_SECRET=abc");
    }

    #[test]
    fn decrypt_rejects_wrong_key() {
        let key = Base64::decode_vec(&generate_key()).unwrap();
        let other = Base64::decode_vec(&generate_key()).unwrap();
        let sealed = encrypt(&key, b"value").unwrap();
        assert!(decrypt(&other, &sealed).is_err());
    }

    #[test]
    fn decrypt_rejects_short_input() {
        let key = Base64::decode_vec(&generate_key()).unwrap();
        assert!(decrypt(&key, &Base64::encode_string(b"short")).is_err());
    }

    #[test]
    fn cipher_rejects_bad_key_length() {
        assert!(encrypt(b"too-short", b"value").is_err());
    }

    #[test]
    fn read_key_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        fs::write(&path, Base64::encode_string(b"0123456789")).unwrap();
        assert!(matches!(
            read_key(&path),
            Err(ConfigError::InvalidKey { .. })
        ));
    }
}
