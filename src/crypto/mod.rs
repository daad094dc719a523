//! Cryptographic primitives and identity management.
//!
//! This module provides all cryptographic functionality needed by the chat
//! node: the long-term X25519 identity, the store of public keys learned
//! about other peers, and the symmetric cipher/digest pair used by the
//! secure channel.

pub mod cipher;
pub mod identity;

pub use cipher::*;
pub use identity::*;
