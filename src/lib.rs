//! # Peerchat
//!
//! A brokerless peer-to-peer chat library with end-to-end encrypted direct
//! and group messaging over plain TCP.
//!
//! ## Features
//!
//! - **Pairwise Encryption**: X25519 key agreement with AES-128-GCM sealing
//! - **Integrity Checking**: SHA-256 plaintext digest verified on every frame
//! - **Direct and Group Chat**: group traffic fans out one sealed frame per
//!   member; no relay or broker is involved
//! - **Manual Peer Exchange**: addresses and public keys are registered
//!   out-of-band, with no discovery protocol
//! - **Modular Design**: clean separation of concerns across modules
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peerchat::{ChatConfig, Node, PeerIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = PeerIdentity::generate("alice");
//!     let mut node = Node::new(identity, ChatConfig::default());
//!     node.start().await?;
//!
//!     node.register_peer("bob", "127.0.0.1:9002".parse()?).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`crypto`]: Identity key pairs, known-key storage, and AEAD sealing
//! - [`network`]: The manually populated peer directory and group registry
//! - [`session`]: Lazy pairwise session-key derivation and caching
//! - [`transport`]: Wire frames, the inbound listener, and outbound delivery
//! - [`store`]: Conversation history with observer notifications
//! - [`node`]: The facade tying everything together for a frontend
//! - [`utils`]: Configuration and error handling
//!
//! Each module is designed to be used independently or as part of the
//! complete chat node.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod network;
pub mod node;
pub mod session;
pub mod store;
pub mod transport;
pub mod utils;

// Re-export commonly used types for convenience
pub use crypto::{PeerIdentity, PeerPublicKey, PublicIdentity};
pub use node::Node;
pub use store::{MessageEvent, StoredMessage};
pub use transport::Frame;
pub use utils::{ChatConfig, ChatError, Result};

/// Default configuration values
pub mod defaults {
    /// Default port the node listens on
    pub const DEFAULT_PORT: u16 = 9001;

    /// Default outbound connection timeout in seconds
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
}
