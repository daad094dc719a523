//! Peer identity management and X25519 key material.
//!
//! This module provides functionality for creating, persisting, and using
//! the long-term cryptographic identity of a node. Identity keys are X25519
//! key-agreement keys: the only asymmetric operation in the protocol is
//! Diffie-Hellman, so no separate signing key exists and frames carry no
//! signatures.

use crate::utils::{ConfigError, CryptoError, Result};
use base64::{engine::general_purpose, Engine};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

/// Length in bytes of an X25519 public key
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length in bytes of an X25519 secret key
pub const SECRET_KEY_LENGTH: usize = 32;

/// File name for the serialized public identity
pub const IDENTITY_FILE: &str = "identity.json";

/// File name for the raw secret key bytes
pub const SECRET_KEY_FILE: &str = "identity.key";

/// A peer's X25519 public key, exchanged out-of-band as base64 text
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPublicKey(#[serde(with = "serde_bytes")] [u8; PUBLIC_KEY_LENGTH]);

impl PeerPublicKey {
    /// Wrap raw public key bytes
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the raw public key bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// Encode the key as standard base64 for manual exchange
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.0)
    }

    /// Decode a key from its base64 form
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the decoded key has the wrong
    /// length, or a base64 error if the text is not valid base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = general_purpose::STANDARD.decode(encoded.trim())?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] =
            bytes.try_into().map_err(|v: Vec<u8>| CryptoError::InvalidKey {
                reason: format!(
                    "Invalid public key length: expected {}, got {}",
                    PUBLIC_KEY_LENGTH,
                    v.len()
                ),
            })?;
        Ok(Self(bytes))
    }

    /// Convert into the dalek public key type for key agreement
    pub fn to_x25519(&self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for PeerPublicKey {
    fn from(key: PublicKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Debug for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerPublicKey({})", self.to_base64())
    }
}

impl fmt::Display for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

/// A node's complete long-term identity: id string plus X25519 key pair.
///
/// Created once at startup (or loaded from disk) and immutable for the
/// node's lifetime. The secret key never leaves this struct except through
/// [`PeerIdentity::save`].
#[derive(Clone)]
pub struct PeerIdentity {
    /// Unique peer identifier, chosen by the operator
    id: String,
    /// X25519 static secret used for key agreement
    secret: StaticSecret,
    /// Public half, announced to other peers out-of-band
    public: PublicKey,
    /// Creation timestamp
    created_at: chrono::DateTime<chrono::Utc>,
}

impl PeerIdentity {
    /// Generate a fresh identity with a random X25519 key pair
    ///
    /// # Example
    ///
    /// ```rust
    /// use peerchat::crypto::PeerIdentity;
    ///
    /// let identity = PeerIdentity::generate("p1");
    /// assert_eq!(identity.id(), "p1");
    /// ```
    pub fn generate(id: impl Into<String>) -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);

        Self {
            id: id.into(),
            secret,
            public,
            created_at: chrono::Utc::now(),
        }
    }

    /// Reconstruct an identity from a stored secret key
    ///
    /// # Arguments
    ///
    /// * `id` - The peer identifier
    /// * `secret_bytes` - 32-byte X25519 secret key
    /// * `created_at` - Original creation timestamp
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the secret key has the wrong length
    pub fn from_secret_bytes(
        id: impl Into<String>,
        secret_bytes: &[u8],
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Self> {
        let bytes: [u8; SECRET_KEY_LENGTH] =
            secret_bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKey {
                    reason: format!(
                        "Invalid secret key length: expected {}, got {}",
                        SECRET_KEY_LENGTH,
                        secret_bytes.len()
                    ),
                })?;

        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);

        Ok(Self {
            id: id.into(),
            secret,
            public,
            created_at,
        })
    }

    /// The peer identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The public key, in the exchangeable wrapper form
    pub fn public_key(&self) -> PeerPublicKey {
        PeerPublicKey::from(self.public)
    }

    /// Creation timestamp
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    /// Run X25519 key agreement between this identity's secret key and a
    /// remote peer's public key
    pub fn diffie_hellman(&self, remote: &PeerPublicKey) -> SharedSecret {
        self.secret.diffie_hellman(&remote.to_x25519())
    }

    /// The shareable public portion of this identity
    pub fn public_identity(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.id.clone(),
            public_key: self.public.to_bytes(),
            created_at: self.created_at,
        }
    }

    /// Persist this identity under `dir`: public part as JSON, secret key
    /// as a raw byte file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Identity` if either file cannot be written;
    /// callers treat this as fatal at startup
    pub fn save(&self, dir: &Path) -> Result<()> {
        let record = self.public_identity();
        let json = record.to_json()?;

        std::fs::write(dir.join(IDENTITY_FILE), json).map_err(|e| ConfigError::Identity {
            reason: format!("Failed to write {IDENTITY_FILE}: {e}"),
        })?;
        std::fs::write(dir.join(SECRET_KEY_FILE), self.secret.to_bytes()).map_err(|e| {
            ConfigError::Identity {
                reason: format!("Failed to write {SECRET_KEY_FILE}: {e}"),
            }
        })?;

        Ok(())
    }

    /// Load a previously saved identity from `dir`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Identity` if the files cannot be read, or
    /// `CryptoError::InvalidKey` if the stored secret does not match the
    /// stored public key
    pub fn load(dir: &Path) -> Result<Self> {
        let json_path = dir.join(IDENTITY_FILE);
        let json = std::fs::read_to_string(&json_path).map_err(|e| ConfigError::Identity {
            reason: format!("Failed to read {}: {e}", json_path.display()),
        })?;
        let record = PublicIdentity::from_json(&json)?;

        let key_path = dir.join(SECRET_KEY_FILE);
        let secret_bytes = std::fs::read(&key_path).map_err(|e| ConfigError::Identity {
            reason: format!("Failed to read {}: {e}", key_path.display()),
        })?;

        let identity = Self::from_secret_bytes(record.id, &secret_bytes, record.created_at)?;
        if identity.public.to_bytes() != record.public_key {
            return Err(CryptoError::InvalidKey {
                reason: "Stored secret key does not match stored public key".to_string(),
            }
            .into());
        }

        Ok(identity)
    }

    /// True if `dir` holds a saved identity
    pub fn exists(dir: &Path) -> bool {
        dir.join(IDENTITY_FILE).exists() && dir.join(SECRET_KEY_FILE).exists()
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerIdentity")
            .field("id", &self.id)
            .field("public", &self.public_key().to_base64())
            .field("secret", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.public_key().to_base64())
    }
}

/// The shareable public portion of a peer identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicIdentity {
    /// Unique peer identifier
    pub id: String,
    /// X25519 public key bytes
    #[serde(with = "serde_bytes")]
    pub public_key: [u8; PUBLIC_KEY_LENGTH],
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PublicIdentity {
    /// The public key in its exchangeable wrapper form
    pub fn peer_public_key(&self) -> PeerPublicKey {
        PeerPublicKey::from_bytes(self.public_key)
    }

    /// Convert this identity to a JSON string for serialization
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Create an identity from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }
}

impl fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.peer_public_key().to_base64())
    }
}

/// Public keys learned about other peers, keyed by peer id.
///
/// Populated out-of-band by manual exchange. Entries are inserted or
/// overwritten, never removed; no authenticity validation is performed, so
/// peers are trusted by identifier alone.
#[derive(Debug, Default)]
pub struct KnownKeys {
    keys: HashMap<String, PeerPublicKey>,
}

impl KnownKeys {
    /// Create an empty key store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the public key for a peer
    pub fn remember(&mut self, peer_id: impl Into<String>, key: PeerPublicKey) {
        self.keys.insert(peer_id.into(), key);
    }

    /// Look up a peer's public key
    pub fn lookup(&self, peer_id: &str) -> Option<PeerPublicKey> {
        self.keys.get(peer_id).copied()
    }

    /// True if a key is known for the peer
    pub fn contains(&self, peer_id: &str) -> bool {
        self.keys.contains_key(peer_id)
    }

    /// Ids of all peers with a known key
    pub fn peer_ids(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    /// Number of known keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if no keys are known
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
