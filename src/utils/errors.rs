//! Error types and handling for the peer chat node.
//!
//! This module provides a unified error handling system across all components
//! of the node. Categories follow the protocol's failure model: only
//! configuration and bind failures are fatal; every other error is isolated
//! to the single send, frame, or connection that raised it.

use thiserror::Error;

/// Result type alias for the peer chat library
pub type Result<T> = std::result::Result<T, ChatError>;

/// Comprehensive error type for all node operations
#[derive(Error, Debug, Clone)]
pub enum ChatError {
    /// Cryptographic and key-material errors
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Peer/group routing errors
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Wire frame encoding/decoding errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Connection and I/O transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration and identity-store errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Base64 encoding/decoding errors
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// UTF-8 conversion errors
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Cryptographic and key-material errors
#[derive(Error, Debug, Clone)]
pub enum CryptoError {
    /// No public key is known for the peer, so no session key can be derived
    #[error("No public key known for peer {peer_id}")]
    UnknownKey { peer_id: String },

    /// Invalid key format or size
    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    /// Encryption operation failure
    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },

    /// Decryption operation failure
    #[error("Decryption failed: {reason}")]
    Decryption { reason: String },
}

/// Peer/group routing errors
#[derive(Error, Debug, Clone)]
pub enum RoutingError {
    /// Peer id has no registered network address
    #[error("Peer not found: {peer_id}")]
    PeerNotFound { peer_id: String },

    /// Group creation was attempted with an empty member list
    #[error("Group {group_id} has no members")]
    EmptyGroup { group_id: String },
}

/// Wire frame encoding/decoding errors
#[derive(Error, Debug, Clone)]
pub enum FrameError {
    /// Line did not split into exactly the required number of fields
    #[error("Malformed frame: expected 4 fields, got {count}")]
    FieldCount { count: usize },

    /// Payload field was not valid base64
    #[error("Invalid payload encoding: {reason}")]
    Payload { reason: String },

    /// Digest field was not valid base64 or had the wrong length
    #[error("Invalid digest field: {reason}")]
    Digest { reason: String },

    /// Recomputed plaintext digest did not match the received digest
    #[error("Integrity failure on frame from {sender}")]
    IntegrityMismatch { sender: String },

    /// An id field contained the field delimiter or a line break
    #[error("Frame field {field} contains a delimiter character")]
    DelimiterInField { field: String },
}

/// Connection and I/O transport errors
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Listening socket could not be bound (fatal at startup)
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// Outbound connection establishment failure
    #[error("Connection failed to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// Outbound connection attempt exceeded the configured timeout
    #[error("Connection to {addr} timed out")]
    Timeout { addr: String },
}

/// Configuration and identity-store errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration serialization error
    #[error("Configuration parse error: {reason}")]
    ParseError { reason: String },

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Directory creation failure
    #[error("Failed to create directory: {path}")]
    DirectoryCreation { path: String },

    /// Identity store read/write failure
    #[error("Identity store error: {reason}")]
    Identity { reason: String },
}

impl ChatError {
    /// Returns true if this error must abort node startup.
    ///
    /// Only configuration/identity failures and a listening-socket bind
    /// failure are fatal; all per-message failures are isolated to that
    /// message or connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Transport(TransportError::Bind { .. })
        )
    }

    /// Returns true if this error indicates tampered or undecryptable data
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::Frame(FrameError::IntegrityMismatch { .. })
                | Self::Crypto(CryptoError::Decryption { .. })
        )
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
