//! Session key cache keyed by conversation id.

use crate::crypto::SessionKey;
use std::collections::HashMap;

/// Cache of derived symmetric keys, keyed by conversation id.
///
/// Direct conversations cache under the remote peer's id. Group ids never
/// gain entries: group frames are sealed per member under the pairwise
/// sender/member key, so only pairwise keys exist.
///
/// Populated lazily on first send or receive for a conversation; once
/// present a key is reused for the life of the process and never rotated
/// or expired.
#[derive(Debug, Default)]
pub struct SessionKeyCache {
    keys: HashMap<String, SessionKey>,
}

impl SessionKeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cached key for a conversation
    pub fn get(&self, conversation_id: &str) -> Option<SessionKey> {
        self.keys.get(conversation_id).copied()
    }

    /// Cache a derived key for a conversation
    pub fn insert(&mut self, conversation_id: impl Into<String>, key: SessionKey) {
        self.keys.insert(conversation_id.into(), key);
    }

    /// True if a key is cached for the conversation
    pub fn contains(&self, conversation_id: &str) -> bool {
        self.keys.contains_key(conversation_id)
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
