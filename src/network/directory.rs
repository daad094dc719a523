//! Flat peer directory and group membership registry.
//!
//! There is no discovery protocol: peers are registered by direct, manual
//! address injection and resolved by id at send time. The directory is the
//! single source of truth for addressing; an unregistered peer is a normal
//! outcome, reported to the caller without any connection attempt.

use std::collections::HashMap;
use std::net::SocketAddr;

/// Mutable mapping from peer id to network address.
///
/// Entries are inserted by explicit registration; last write wins; nothing
/// expires.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: HashMap<String, SocketAddr>,
}

impl PeerDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite the address for a peer
    pub fn register(&mut self, peer_id: impl Into<String>, addr: SocketAddr) {
        self.peers.insert(peer_id.into(), addr);
    }

    /// Resolve a peer id to its registered address.
    ///
    /// `None` means the peer is unregistered, which callers report as
    /// "peer not found" and treat as the end of that send.
    pub fn resolve(&self, peer_id: &str) -> Option<SocketAddr> {
        self.peers.get(peer_id).copied()
    }

    /// True if the peer has a registered address
    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }

    /// All registered peers with their addresses
    pub fn peers(&self) -> Vec<(String, SocketAddr)> {
        self.peers
            .iter()
            .map(|(id, addr)| (id.clone(), *addr))
            .collect()
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True if no peers are registered
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Group membership lists, keyed by group id.
///
/// A group exists from the moment its member list is registered, either by
/// the creating side after its bootstrap fan-out or by a receiver decoding
/// a bootstrap frame. Member order is the order of the bootstrap list so
/// fan-out order is reproducible.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: HashMap<String, Vec<String>>,
}

impl GroupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the member list for a group
    pub fn register(&mut self, group_id: impl Into<String>, members: Vec<String>) {
        self.groups.insert(group_id.into(), members);
    }

    /// The member list for a group, in bootstrap order
    pub fn members(&self, group_id: &str) -> Option<Vec<String>> {
        self.groups.get(group_id).cloned()
    }

    /// True if a member list is registered for the group
    pub fn contains(&self, group_id: &str) -> bool {
        self.groups.contains_key(group_id)
    }

    /// Ids of all known groups
    pub fn group_ids(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// Number of known groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True if no groups are known
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn test_directory_register_and_resolve() {
        let mut directory = PeerDirectory::new();
        assert!(directory.is_empty());

        directory.register("p2", addr(9002));
        assert_eq!(directory.resolve("p2"), Some(addr(9002)));
        assert!(directory.contains("p2"));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_directory_unknown_peer_is_none() {
        let directory = PeerDirectory::new();
        assert_eq!(directory.resolve("p9"), None);
    }

    #[test]
    fn test_directory_last_write_wins() {
        let mut directory = PeerDirectory::new();

        directory.register("p2", addr(9002));
        directory.register("p2", addr(9102));

        assert_eq!(directory.resolve("p2"), Some(addr(9102)));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_group_membership_order_is_stable() {
        let mut groups = GroupRegistry::new();
        let members = vec!["p1".to_string(), "p2".to_string(), "p3".to_string()];

        groups.register("teamA", members.clone());

        assert!(groups.contains("teamA"));
        assert_eq!(groups.members("teamA"), Some(members));
        assert_eq!(groups.members("teamB"), None);
    }
}
