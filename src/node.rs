//! Node lifecycle and coordination.
//!
//! This module provides the main node structure that ties all components of
//! the chat system together: the identity, the peer directory, group
//! membership, session-key agreement, the inbound listener, and the
//! conversation store. It is the boundary a frontend (CLI or GUI) talks to.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;

use crate::crypto::{KnownKeys, PeerIdentity, PeerPublicKey};
use crate::network::{GroupRegistry, PeerDirectory};
use crate::session::{KeyAgreement, SessionKeyCache};
use crate::store::{ConversationStore, MessageEvent, MessageObserver, StoredMessage};
use crate::transport::{channel, outbound, Frame, HandlerContext, Listener};
use crate::utils::{ChatConfig, Result, RoutingError};

/// A chat node: identity, peer knowledge, and message plumbing
pub struct Node {
    /// Node configuration
    config: ChatConfig,
    /// This node's identity and key pair
    identity: Arc<PeerIdentity>,
    /// Peer id to network address mapping
    peers: Arc<RwLock<PeerDirectory>>,
    /// Group id to member list mapping
    groups: Arc<RwLock<GroupRegistry>>,
    /// Public keys learned out-of-band
    known_keys: Arc<RwLock<KnownKeys>>,
    /// Lazy pairwise session-key derivation
    agreement: KeyAgreement,
    /// Conversation history and notification fan-out
    store: Arc<ConversationStore>,
    /// Address the listener actually bound, set by `start`
    local_addr: Option<SocketAddr>,
}

impl Node {
    /// Create a node from an identity and configuration
    ///
    /// The node does not accept connections until [`Node::start`] is called.
    pub fn new(identity: PeerIdentity, config: ChatConfig) -> Self {
        let identity = Arc::new(identity);
        let known_keys = Arc::new(RwLock::new(KnownKeys::new()));
        let cache = Arc::new(RwLock::new(SessionKeyCache::new()));
        let agreement = KeyAgreement::new(
            Arc::clone(&identity),
            Arc::clone(&known_keys),
            Arc::clone(&cache),
        );

        Self {
            config,
            identity,
            peers: Arc::new(RwLock::new(PeerDirectory::new())),
            groups: Arc::new(RwLock::new(GroupRegistry::new())),
            known_keys,
            agreement,
            store: Arc::new(ConversationStore::new()),
            local_addr: None,
        }
    }

    /// Bind the listener and start accepting peer connections
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Bind` if the configured address cannot be
    /// bound; this is fatal for the node
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let listener = Listener::bind(self.config.network.listen_addr()).await?;
        let addr = listener.local_addr();
        self.local_addr = Some(addr);

        let ctx = HandlerContext::new(
            Arc::clone(&self.groups),
            self.agreement.clone(),
            Arc::clone(&self.store),
        );
        tokio::spawn(listener.run(ctx));

        info!("Node {} listening on {addr}", self.identity.id());
        Ok(addr)
    }

    /// This node's peer id
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    /// This node's public key, for out-of-band exchange
    pub fn public_key(&self) -> PeerPublicKey {
        self.identity.public_key()
    }

    /// The address the listener bound, if the node has been started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Register or update a peer's network address
    pub async fn register_peer(&self, peer_id: impl Into<String>, addr: SocketAddr) {
        let peer_id = peer_id.into();
        debug!("Registered peer {peer_id} at {addr}");
        self.peers.write().await.register(peer_id, addr);
    }

    /// Remember or replace a peer's public key
    pub async fn remember_public_key(&self, peer_id: impl Into<String>, key: PeerPublicKey) {
        self.known_keys.write().await.remember(peer_id, key);
    }

    /// All registered peers with their addresses
    pub async fn known_peers(&self) -> Vec<(String, SocketAddr)> {
        self.peers.read().await.peers()
    }

    /// Member list of a group, if its membership is known locally
    pub async fn group_members(&self, group_id: &str) -> Option<Vec<String>> {
        self.groups.read().await.members(group_id)
    }

    /// Send an encrypted direct message to one peer
    ///
    /// The message is appended to the local conversation under the
    /// recipient's id only after delivery succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::PeerNotFound` if the recipient has no
    /// registered address (no connection is attempted),
    /// `CryptoError::UnknownKey` if no public key is known for the
    /// recipient, and a transport error if delivery fails
    pub async fn send_direct(&self, recipient_id: &str, text: &str) -> Result<()> {
        let addr = self.resolve_peer(recipient_id).await?;
        let key = self.agreement.session_key(recipient_id).await?;
        let frame = channel::seal(None, self.identity.id(), text, &key)?;

        outbound::deliver(addr, &frame, self.connect_timeout()).await?;
        debug!("Sent direct message to {recipient_id}");

        self.store
            .append(recipient_id, StoredMessage::new(self.identity.id(), text))
            .await;
        Ok(())
    }

    /// Send a message to a group, creating the group on first use
    ///
    /// If the group id is unknown locally this call is group creation:
    /// `text` is the pipe-joined member-id list, fanned out as one
    /// unencrypted bootstrap frame per member, after which the membership
    /// is registered. Otherwise one encrypted frame is sealed and sent per
    /// member under the pairwise key for that member. Per-member delivery
    /// failures are logged and skipped; the message is appended to the
    /// local conversation once, under the group id, regardless of fan-out
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::EmptyGroup` if a creation call carries no
    /// member ids; nothing is sent or stored in that case
    pub async fn send_group(&self, group_id: &str, text: &str) -> Result<()> {
        // Bind before matching: the read guard must not be held while
        // create_group takes the write lock
        let members = self.groups.read().await.members(group_id);
        match members {
            None => self.create_group(group_id, text).await?,
            Some(members) => {
                for member in &members {
                    if member == self.identity.id() {
                        continue;
                    }
                    if let Err(e) = self.send_group_frame(group_id, member, text).await {
                        warn!("Skipping group message to {member}: {e}");
                    }
                }
            }
        }

        self.store
            .append(group_id, StoredMessage::new(self.identity.id(), text))
            .await;
        Ok(())
    }

    /// Messages of one conversation in append order, empty if unknown
    pub async fn messages(&self, conversation_id: &str) -> Vec<StoredMessage> {
        self.store.messages(conversation_id).await
    }

    /// Ids of all conversations holding at least one message
    pub async fn conversations(&self) -> Vec<String> {
        self.store.conversations().await
    }

    /// Register a callback invoked after every successful append
    pub async fn add_observer(&self, observer: MessageObserver) {
        self.store.add_observer(observer).await;
    }

    /// Open a channel receiving every message appended from now on
    pub async fn subscribe(&self) -> UnboundedReceiver<MessageEvent> {
        self.store.subscribe().await
    }

    /// Fan out a bootstrap frame to a new group's members, then register
    /// the membership locally
    async fn create_group(&self, group_id: &str, member_line: &str) -> Result<()> {
        let members = channel::split_members(member_line);
        if members.is_empty() {
            return Err(RoutingError::EmptyGroup {
                group_id: group_id.to_string(),
            }
            .into());
        }

        let frame = channel::seal_bootstrap(group_id, self.identity.id(), member_line)?;
        let mut delivered = 0;
        for member in &members {
            if member == self.identity.id() {
                continue;
            }
            match self.deliver_to_peer(member, &frame).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Skipping bootstrap to {member}: {e}"),
            }
        }

        info!(
            "Created group {group_id} with {} members ({delivered} bootstrap frames delivered)",
            members.len()
        );
        self.groups.write().await.register(group_id, members);
        Ok(())
    }

    /// Seal one group message for one member and deliver it
    async fn send_group_frame(&self, group_id: &str, member: &str, text: &str) -> Result<()> {
        let key = self.agreement.session_key(member).await?;
        let frame = channel::seal(Some(group_id), self.identity.id(), text, &key)?;
        self.deliver_to_peer(member, &frame).await
    }

    /// Resolve a peer's address and deliver one frame to it
    async fn deliver_to_peer(&self, peer_id: &str, frame: &Frame) -> Result<()> {
        let addr = self.resolve_peer(peer_id).await?;
        outbound::deliver(addr, frame, self.connect_timeout()).await
    }

    async fn resolve_peer(&self, peer_id: &str) -> Result<SocketAddr> {
        self.peers
            .read()
            .await
            .resolve(peer_id)
            .ok_or_else(|| {
                RoutingError::PeerNotFound {
                    peer_id: peer_id.to_string(),
                }
                .into()
            })
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.network.connect_timeout_secs)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.identity.id())
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{ChatError, CryptoError};
    use tokio::time::{sleep, timeout};

    fn test_config() -> ChatConfig {
        let mut config = ChatConfig::default();
        config.network.listen_address = "127.0.0.1".parse().unwrap();
        config.network.listen_port = 0;
        config
    }

    async fn started_node(id: &str) -> Node {
        let mut node = Node::new(PeerIdentity::generate(id), test_config());
        node.start().await.unwrap();
        node
    }

    /// Exchange addresses and public keys in both directions
    async fn link(a: &Node, b: &Node) {
        a.register_peer(b.id(), b.local_addr().unwrap()).await;
        a.remember_public_key(b.id(), b.public_key()).await;
        b.register_peer(a.id(), a.local_addr().unwrap()).await;
        b.remember_public_key(a.id(), a.public_key()).await;
    }

    async fn next_event(rx: &mut UnboundedReceiver<MessageEvent>) -> MessageEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for message event")
            .expect("event channel closed")
    }

    async fn wait_for_members(node: &Node, group_id: &str) -> Vec<String> {
        timeout(Duration::from_secs(5), async {
            loop {
                if let Some(members) = node.group_members(group_id).await {
                    return members;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for group membership")
    }

    #[tokio::test]
    async fn test_direct_message_between_nodes() {
        let p1 = started_node("p1").await;
        let p2 = started_node("p2").await;
        link(&p1, &p2).await;

        let mut p2_events = p2.subscribe().await;
        p1.send_direct("p2", "hello").await.unwrap();

        // Receiver files it under the sender's id
        let event = next_event(&mut p2_events).await;
        assert_eq!(event.conversation_id, "p1");
        assert_eq!(event.message.sender, "p1");
        assert_eq!(event.message.body, "hello");

        // Sender files its own copy under the recipient's id
        let sent = p1.messages("p2").await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sender, "p1");
        assert_eq!(sent[0].body, "hello");
    }

    #[tokio::test]
    async fn test_send_to_unregistered_peer() {
        let p1 = started_node("p1").await;

        let result = p1.send_direct("p2", "hello").await;
        assert!(matches!(
            result,
            Err(ChatError::Routing(RoutingError::PeerNotFound { .. }))
        ));
        assert!(p1.conversations().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_without_known_key() {
        let p1 = started_node("p1").await;
        let p2 = started_node("p2").await;

        // Address registered, public key never exchanged
        p1.register_peer(p2.id(), p2.local_addr().unwrap()).await;

        let result = p1.send_direct("p2", "hello").await;
        assert!(matches!(
            result,
            Err(ChatError::Crypto(CryptoError::UnknownKey { .. }))
        ));
        assert!(p1.conversations().await.is_empty());
    }

    #[tokio::test]
    async fn test_group_bootstrap_and_message() {
        let p1 = started_node("p1").await;
        let p2 = started_node("p2").await;
        let p3 = started_node("p3").await;
        link(&p1, &p2).await;
        link(&p1, &p3).await;
        link(&p2, &p3).await;

        let mut p2_events = p2.subscribe().await;
        let mut p3_events = p3.subscribe().await;

        // First send to an unknown group id creates it from the member line
        p1.send_group("teamA", "p1|p2|p3").await.unwrap();

        let expected = vec!["p1".to_string(), "p2".to_string(), "p3".to_string()];
        assert_eq!(p1.group_members("teamA").await, Some(expected.clone()));
        assert_eq!(wait_for_members(&p2, "teamA").await, expected);
        assert_eq!(wait_for_members(&p3, "teamA").await, expected);

        // The creator logs the member line as the first group message
        let created = p1.messages("teamA").await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].body, "p1|p2|p3");

        // Receivers record nothing for the bootstrap itself
        assert!(p2.conversations().await.is_empty());
        assert!(p3.conversations().await.is_empty());

        p1.send_group("teamA", "hi team").await.unwrap();

        let at_p2 = next_event(&mut p2_events).await;
        assert_eq!(at_p2.conversation_id, "teamA");
        assert_eq!(at_p2.message.sender, "p1");
        assert_eq!(at_p2.message.body, "hi team");

        let at_p3 = next_event(&mut p3_events).await;
        assert_eq!(at_p3.conversation_id, "teamA");
        assert_eq!(at_p3.message.body, "hi team");

        assert_eq!(p1.messages("teamA").await.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_group_creation_is_rejected() {
        let p1 = started_node("p1").await;

        let result = p1.send_group("ghosts", "").await;
        assert!(matches!(
            result,
            Err(ChatError::Routing(RoutingError::EmptyGroup { .. }))
        ));
        assert!(p1.conversations().await.is_empty());
        assert_eq!(p1.group_members("ghosts").await, None);
    }

    #[tokio::test]
    async fn test_group_fan_out_skips_unreachable_member() {
        let p1 = started_node("p1").await;
        let p2 = started_node("p2").await;
        link(&p1, &p2).await;

        let mut p2_events = p2.subscribe().await;

        // p4 is never registered; the send still succeeds for the rest
        p1.send_group("teamB", "p1|p2|p4").await.unwrap();
        assert_eq!(
            p1.group_members("teamB").await,
            Some(vec!["p1".to_string(), "p2".to_string(), "p4".to_string()])
        );

        wait_for_members(&p2, "teamB").await;
        p1.send_group("teamB", "partial crowd").await.unwrap();

        let event = next_event(&mut p2_events).await;
        assert_eq!(event.conversation_id, "teamB");
        assert_eq!(event.message.body, "partial crowd");
        assert_eq!(p1.messages("teamB").await.len(), 2);
    }
}
