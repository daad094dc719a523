//! Inbound TCP listener and per-connection frame handlers.
//!
//! The listener accepts connections and spawns one handler task per peer
//! connection. A handler reads newline-delimited frames until EOF and
//! dispatches each one:
//!
//! - group frame for an unknown group: treated as a bootstrap, its member
//!   list registered after digest verification
//! - anything else: decrypted under the pairwise session key with the
//!   sender and appended to the conversation store
//!
//! Malformed lines, unknown senders, and integrity failures are logged and
//! discarded without closing the connection; only I/O errors terminate a
//! handler.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

use crate::network::GroupRegistry;
use crate::session::KeyAgreement;
use crate::store::{ConversationStore, StoredMessage};
use crate::transport::channel;
use crate::transport::frame::Frame;
use crate::utils::{Result, TransportError};

/// Shared state handed to every connection handler
#[derive(Clone)]
pub struct HandlerContext {
    groups: Arc<RwLock<GroupRegistry>>,
    agreement: KeyAgreement,
    store: Arc<ConversationStore>,
}

impl HandlerContext {
    /// Bundle the shared state the handlers operate on
    pub fn new(
        groups: Arc<RwLock<GroupRegistry>>,
        agreement: KeyAgreement,
        store: Arc<ConversationStore>,
    ) -> Self {
        Self {
            groups,
            agreement,
            store,
        }
    }
}

/// Listening socket accepting peer connections
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind the listening socket
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Bind` if the address cannot be bound. This
    /// is a fatal error; a node that cannot listen cannot participate.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        info!("Listening on {local_addr}");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The address the socket actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever, spawning a handler task for each
    pub async fn run(self, ctx: HandlerContext) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Accepted connection from {addr}");
                    tokio::spawn(handle_connection(stream, addr, ctx.clone()));
                }
                Err(e) => warn!("Failed to accept connection: {e}"),
            }
        }
    }
}

/// Read frames off one connection until EOF or an I/O error
async fn handle_connection(stream: TcpStream, addr: SocketAddr, ctx: HandlerContext) {
    let mut lines = BufReader::new(stream).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match Frame::parse(&line) {
                Ok(frame) => process_frame(&ctx, frame).await,
                Err(e) => warn!("Discarding malformed line from {addr}: {e}"),
            },
            Ok(None) => {
                debug!("Connection from {addr} closed");
                return;
            }
            Err(e) => {
                warn!("Connection from {addr} failed: {e}");
                return;
            }
        }
    }
}

/// Dispatch one parsed frame: group bootstrap or encrypted message
async fn process_frame(ctx: &HandlerContext, frame: Frame) {
    if let Some(group_id) = frame.group.clone() {
        // A group frame for a group we have no membership for must be its
        // bootstrap. An encrypted frame landing here (say, a missed
        // bootstrap) fails digest verification and is discarded.
        if !ctx.groups.read().await.contains(&group_id) {
            match channel::open_bootstrap(&frame) {
                Ok(members) => {
                    info!(
                        "Registered group {group_id} with {} members from {}",
                        members.len(),
                        frame.sender
                    );
                    ctx.groups.write().await.register(group_id, members);
                }
                Err(e) => {
                    warn!("Discarding invalid bootstrap for group {group_id}: {e}");
                }
            }
            return;
        }
    }

    let key = match ctx.agreement.session_key(&frame.sender).await {
        Ok(key) => key,
        Err(e) => {
            warn!("Dropping frame from {}: {e}", frame.sender);
            return;
        }
    };

    let plaintext = match channel::open(&frame, &key) {
        Ok(text) => text,
        Err(e) => {
            warn!("Discarding frame from {}: {e}", frame.sender);
            return;
        }
    };

    let conversation_id = frame
        .group
        .clone()
        .unwrap_or_else(|| frame.sender.clone());
    debug!(
        "Message from {} appended to conversation {conversation_id}",
        frame.sender
    );
    ctx.store
        .append(&conversation_id, StoredMessage::new(frame.sender, plaintext))
        .await;
}
