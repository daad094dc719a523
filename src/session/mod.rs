//! Session key management and pairwise key agreement.
//!
//! This module provides the session layer for secure messaging: the
//! per-conversation symmetric key cache and the Diffie-Hellman engine that
//! populates it lazily.

pub mod agreement;
pub mod cache;

pub use agreement::*;
pub use cache::*;
