//! Network layer for peer addressing.
//!
//! This module provides the flat, manually populated peer directory and the
//! group membership registry. There is no discovery protocol or NAT
//! traversal; addresses arrive by explicit registration only.

pub mod directory;

pub use directory::*;
