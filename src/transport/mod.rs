//! Transport layer for peer-to-peer messaging.
//!
//! This module provides the wire format and TCP plumbing for the chat node,
//! including frame encoding, sealed-channel helpers, the inbound listener,
//! and outbound delivery.

pub mod channel;
pub mod frame;
pub mod listener;
pub mod outbound;

pub use frame::*;
pub use listener::{HandlerContext, Listener};
