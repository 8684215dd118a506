//! Field-level encryption for stored findings.
//!
//! Sensitive match fields (value, context) are AES-256-GCM encrypted before
//! they reach the database. Ciphertext is stored as base64 of
//! `[nonce (12 bytes)][ciphertext+tag]`, safe for a TEXT column.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Encryption/decryption failures.
///
/// `Decrypt` is distinct from an absent value: it means ciphertext exists
/// but the active key cannot open it (wrong key or corrupted data).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed (wrong key or corrupted data): {0}")]
    Decrypt(String),

    #[error("malformed ciphertext encoding: {0}")]
    Encoding(String),
}

/// Encrypts and decrypts sensitive strings with a symmetric key.
///
/// Each encryption uses a fresh random nonce, so equal plaintexts never
/// produce equal ciphertexts.
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}

impl Encryptor {
    pub fn new(key: &[u8; KEY_LEN]) -> Result<Self, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Encryptor { cipher })
    }

    /// Encrypt a string. Empty input round-trips as the empty string so
    /// that "no context" needs no sentinel in the database.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(sealed))
    }

    /// Decrypt a string produced by [`Encryptor::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let sealed = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;

        if sealed.len() < NONCE_LEN {
            return Err(CryptoError::Encoding("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce_arr: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::Encoding("invalid nonce length".to_string()))?;
        let nonce = Nonce::from(nonce_arr);

        let plaintext = self
            .cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::Decrypt(format!("plaintext not UTF-8: {e}")))
    }
}
