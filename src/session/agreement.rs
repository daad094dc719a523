//! Pairwise key agreement and lazy session-key derivation.
//!
//! The protocol's only key-establishment primitive is single-phase X25519
//! Diffie-Hellman between two static identity keys. The derived symmetric
//! key is the 16-byte prefix of the shared secret, used directly as an
//! AES-128 key; no KDF is applied.
//!
//! Group conversations carry no group key. Each group frame is sealed for
//! one recipient under the pairwise sender/member key, so group
//! confidentiality reduces to the pairwise case per member.

use crate::crypto::{KnownKeys, PeerIdentity, PeerPublicKey, SessionKey, SESSION_KEY_SIZE};
use crate::session::SessionKeyCache;
use crate::utils::{CryptoError, Result};
use log::debug;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Derive the symmetric session key shared by two peers.
///
/// Runs X25519 agreement between the local secret and the remote public key
/// and keeps the first [`SESSION_KEY_SIZE`] bytes of the 32-byte shared
/// secret. Both sides arrive at the same key:
/// `derive(a, B_pub) == derive(b, A_pub)`.
pub fn derive_pairwise(identity: &PeerIdentity, remote: &PeerPublicKey) -> SessionKey {
    let shared = identity.diffie_hellman(remote);
    let mut key = [0u8; SESSION_KEY_SIZE];
    key.copy_from_slice(&shared.as_bytes()[..SESSION_KEY_SIZE]);
    SessionKey::from_bytes(key)
}

/// Lazily derives and caches session keys for conversations.
///
/// Shared by the send paths and every connection handler. All lookups go
/// through the known-keys store and the session cache; no other copy of key
/// material exists.
#[derive(Clone)]
pub struct KeyAgreement {
    identity: Arc<PeerIdentity>,
    known_keys: Arc<RwLock<KnownKeys>>,
    cache: Arc<RwLock<SessionKeyCache>>,
}

impl KeyAgreement {
    /// Create an agreement engine over shared key state
    pub fn new(
        identity: Arc<PeerIdentity>,
        known_keys: Arc<RwLock<KnownKeys>>,
        cache: Arc<RwLock<SessionKeyCache>>,
    ) -> Self {
        Self {
            identity,
            known_keys,
            cache,
        }
    }

    /// Return the session key for a peer, deriving and caching it from the
    /// peer's known public key on first use.
    ///
    /// Concurrent first use may derive twice; X25519 is deterministic so
    /// both writes carry the same key.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::UnknownKey` if no public key is known for the
    /// peer; nothing is cached in that case.
    pub async fn session_key(&self, peer_id: &str) -> Result<SessionKey> {
        if let Some(key) = self.cache.read().await.get(peer_id) {
            return Ok(key);
        }

        let remote = self
            .known_keys
            .read()
            .await
            .lookup(peer_id)
            .ok_or_else(|| CryptoError::UnknownKey {
                peer_id: peer_id.to_string(),
            })?;

        let key = derive_pairwise(&self.identity, &remote);
        self.cache.write().await.insert(peer_id, key);
        debug!("Derived session key for conversation with {peer_id}");

        Ok(key)
    }

    /// True if a session key is already cached for the conversation
    pub async fn has_session(&self, conversation_id: &str) -> bool {
        self.cache.read().await.contains(conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(identity: PeerIdentity) -> KeyAgreement {
        KeyAgreement::new(
            Arc::new(identity),
            Arc::new(RwLock::new(KnownKeys::new())),
            Arc::new(RwLock::new(SessionKeyCache::new())),
        )
    }

    #[test]
    fn test_pairwise_derivation_is_symmetric() {
        let a = PeerIdentity::generate("a");
        let b = PeerIdentity::generate("b");

        let key_at_a = derive_pairwise(&a, &b.public_key());
        let key_at_b = derive_pairwise(&b, &a.public_key());

        assert_eq!(key_at_a, key_at_b);
    }

    #[test]
    fn test_derived_key_is_shared_secret_prefix() {
        let a = PeerIdentity::generate("a");
        let b = PeerIdentity::generate("b");

        let shared = a.diffie_hellman(&b.public_key());
        let key = derive_pairwise(&a, &b.public_key());

        assert_eq!(key.as_bytes(), &shared.as_bytes()[..SESSION_KEY_SIZE]);
    }

    #[test]
    fn test_distinct_pairs_distinct_keys() {
        let a = PeerIdentity::generate("a");
        let b = PeerIdentity::generate("b");
        let c = PeerIdentity::generate("c");

        let key_ab = derive_pairwise(&a, &b.public_key());
        let key_ac = derive_pairwise(&a, &c.public_key());

        assert_ne!(key_ab, key_ac);
    }

    #[tokio::test]
    async fn test_session_key_requires_known_public_key() {
        let agreement = engine(PeerIdentity::generate("a"));

        let result = agreement.session_key("stranger").await;
        assert!(matches!(
            result,
            Err(crate::utils::ChatError::Crypto(CryptoError::UnknownKey { .. }))
        ));

        // A failed derivation caches nothing
        assert!(!agreement.has_session("stranger").await);
    }

    #[tokio::test]
    async fn test_session_key_derives_once_and_caches() {
        let a = PeerIdentity::generate("a");
        let b = PeerIdentity::generate("b");

        let agreement = engine(a.clone());
        agreement
            .known_keys
            .write()
            .await
            .remember("b", b.public_key());

        assert!(!agreement.has_session("b").await);

        let first = agreement.session_key("b").await.unwrap();
        assert!(agreement.has_session("b").await);

        let second = agreement.session_key("b").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, derive_pairwise(&b, &a.public_key()));
    }
}
