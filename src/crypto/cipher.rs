//! Symmetric encryption and digest primitives for the secure channel.
//!
//! Messages are encrypted with AES-128-GCM under session keys produced by
//! X25519 key agreement. A SHA-256 digest over the plaintext rides alongside
//! every frame as the protocol's own integrity check, uniform across
//! encrypted and bootstrap frames.

use crate::utils::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit},
    Aes128Gcm, Nonce,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;

/// Size in bytes of a session key (AES-128)
pub const SESSION_KEY_SIZE: usize = 16;

/// Size in bytes of the AES-GCM nonce prepended to each ciphertext
pub const NONCE_SIZE: usize = 12;

/// Size in bytes of a SHA-256 digest
pub const DIGEST_SIZE: usize = 32;

/// A symmetric session key for one conversation.
///
/// Derived lazily from key agreement, cached for the life of the process,
/// never rotated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

/// Encrypt plaintext under a session key.
///
/// Returns the random 12-byte nonce followed by the AES-128-GCM ciphertext
/// so the frame payload is self-contained.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the AEAD operation fails
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new(key.as_bytes().into());
    let nonce = Aes128Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Encryption {
            reason: "AES-GCM encryption failed".to_string(),
        })?;

    // Prepend nonce to ciphertext
    let mut result = nonce.to_vec();
    result.append(&mut ciphertext);
    Ok(result)
}

/// Decrypt a nonce-prefixed ciphertext under a session key
///
/// # Errors
///
/// Returns `CryptoError::Decryption` if the payload is too short to carry a
/// nonce or the AEAD tag does not verify (wrong key or tampered ciphertext)
pub fn decrypt(key: &SessionKey, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::Decryption {
            reason: format!("Ciphertext too short: {} bytes", data.len()),
        }
        .into());
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = Aes128Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| {
            CryptoError::Decryption {
                reason: "AES-GCM decryption failed".to_string(),
            }
            .into()
        })
}

/// SHA-256 digest over plaintext bytes
pub fn digest(plaintext: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(plaintext);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(byte: u8) -> SessionKey {
        SessionKey::from_bytes([byte; SESSION_KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let key = test_key(7);
        let plaintext = b"hello over the wire";

        let ciphertext = encrypt(&key, plaintext).unwrap();
        assert_ne!(&ciphertext[NONCE_SIZE..], plaintext.as_slice());

        let decrypted = decrypt(&key, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let ciphertext = encrypt(&test_key(1), b"secret").unwrap();
        assert!(decrypt(&test_key(2), &ciphertext).is_err());
    }

    #[test]
    fn test_decrypt_tampered_ciphertext_fails() {
        let key = test_key(3);
        let mut ciphertext = encrypt(&key, b"secret").unwrap();

        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;
        assert!(decrypt(&key, &ciphertext).is_err());
    }

    #[test]
    fn test_decrypt_truncated_input_fails() {
        let key = test_key(4);
        assert!(decrypt(&key, &[0u8; NONCE_SIZE - 1]).is_err());
    }

    #[test]
    fn test_nonce_randomization() {
        let key = test_key(5);
        let first = encrypt(&key, b"same message").unwrap();
        let second = encrypt(&key, b"same message").unwrap();

        // Fresh nonce per encryption, so ciphertexts differ
        assert_ne!(first, second);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = digest(b"payload");
        let b = digest(b"payload");
        let c = digest(b"payload!");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), DIGEST_SIZE);
    }

    #[test]
    fn test_session_key_debug_redacted() {
        let key = test_key(6);
        assert_eq!(format!("{key:?}"), "SessionKey([REDACTED])");
    }
}
