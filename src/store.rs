//! In-memory conversation history with delivery notifications.
//!
//! Every accepted message (sent or received) is appended to exactly one
//! conversation: the peer id for direct traffic, the group id for group
//! traffic. The store also fans appended messages out to registered
//! observer callbacks and channel subscribers so interactive frontends can
//! react without polling.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

/// One message as recorded in a conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Id of the peer that authored the message
    pub sender: String,
    /// Decrypted message text
    pub body: String,
    /// When this node appended the message
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    /// Create a message stamped with the current time
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Notification emitted when a message lands in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Conversation the message was appended to (peer id or group id)
    pub conversation_id: String,
    /// The appended message
    pub message: StoredMessage,
}

/// Callback invoked for every appended message
pub type MessageObserver = Arc<dyn Fn(&MessageEvent) + Send + Sync>;

/// Append-only map of conversation id to message history
#[derive(Debug, Default)]
pub struct ConversationLog {
    conversations: HashMap<String, Vec<StoredMessage>>,
}

impl ConversationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a conversation, creating it on first use
    pub fn append(&mut self, conversation_id: &str, message: StoredMessage) {
        self.conversations
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
    }

    /// Messages of one conversation in append order, empty if unknown
    pub fn messages(&self, conversation_id: &str) -> Vec<StoredMessage> {
        self.conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Ids of all conversations that have at least one message
    pub fn conversation_ids(&self) -> Vec<String> {
        self.conversations.keys().cloned().collect()
    }

    /// Total number of stored messages across all conversations
    pub fn len(&self) -> usize {
        self.conversations.values().map(Vec::len).sum()
    }

    /// Check whether the log holds no messages at all
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

/// Shared conversation store with observer and subscription fan-out
pub struct ConversationStore {
    log: RwLock<ConversationLog>,
    observers: RwLock<Vec<MessageObserver>>,
    subscribers: RwLock<Vec<UnboundedSender<MessageEvent>>>,
}

impl ConversationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            log: RwLock::new(ConversationLog::new()),
            observers: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Append a message and notify observers and subscribers
    ///
    /// The log lock is released before callbacks run, so observers may call
    /// back into the store without deadlocking.
    pub async fn append(&self, conversation_id: &str, message: StoredMessage) {
        {
            let mut log = self.log.write().await;
            log.append(conversation_id, message.clone());
        }

        let event = MessageEvent {
            conversation_id: conversation_id.to_string(),
            message,
        };

        for observer in self.observers.read().await.iter() {
            observer(&event);
        }

        // Dropped receivers fail the send; prune them as we go
        self.subscribers
            .write()
            .await
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Messages of one conversation in append order, empty if unknown
    pub async fn messages(&self, conversation_id: &str) -> Vec<StoredMessage> {
        self.log.read().await.messages(conversation_id)
    }

    /// Ids of all conversations that have at least one message
    pub async fn conversations(&self) -> Vec<String> {
        self.log.read().await.conversation_ids()
    }

    /// Register a callback invoked for every appended message
    pub async fn add_observer(&self, observer: MessageObserver) {
        self.observers.write().await.push(observer);
    }

    /// Open a channel that receives every message appended from now on
    pub async fn subscribe(&self) -> UnboundedReceiver<MessageEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().await.push(tx);
        rx
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_log_appends_in_order() {
        let mut log = ConversationLog::new();
        log.append("p2", StoredMessage::new("p1", "first"));
        log.append("p2", StoredMessage::new("p2", "second"));

        let messages = log.messages("p2");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "first");
        assert_eq!(messages[1].body, "second");
    }

    #[test]
    fn test_log_unknown_conversation_is_empty() {
        let log = ConversationLog::new();
        assert!(log.messages("nobody").is_empty());
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn test_log_separates_conversations() {
        let mut log = ConversationLog::new();
        log.append("p2", StoredMessage::new("p1", "direct"));
        log.append("teamA", StoredMessage::new("p1", "group"));

        assert_eq!(log.messages("p2").len(), 1);
        assert_eq!(log.messages("teamA").len(), 1);
        assert_eq!(log.len(), 2);

        let mut ids = log.conversation_ids();
        ids.sort();
        assert_eq!(ids, vec!["p2", "teamA"]);
    }

    #[tokio::test]
    async fn test_store_append_and_read_back() {
        let store = ConversationStore::new();
        store.append("p2", StoredMessage::new("p1", "hello")).await;

        let messages = store.messages("p2").await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, "p1");
        assert_eq!(messages[0].body, "hello");
    }

    #[tokio::test]
    async fn test_store_notifies_observers() {
        let store = ConversationStore::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        store
            .add_observer(Arc::new(move |event: &MessageEvent| {
                assert_eq!(event.conversation_id, "p2");
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await;

        store.append("p2", StoredMessage::new("p1", "one")).await;
        store.append("p2", StoredMessage::new("p1", "two")).await;

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_subscription_receives_events() {
        let store = ConversationStore::new();
        let mut rx = store.subscribe().await;

        store
            .append("teamA", StoredMessage::new("p1", "hi team"))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.conversation_id, "teamA");
        assert_eq!(event.message.body, "hi team");
    }

    #[tokio::test]
    async fn test_store_prunes_dropped_subscribers() {
        let store = ConversationStore::new();
        let rx = store.subscribe().await;
        drop(rx);

        // Append must not fail because a subscriber went away
        store.append("p2", StoredMessage::new("p1", "still fine")).await;
        assert_eq!(store.subscribers.read().await.len(), 0);
    }
}
