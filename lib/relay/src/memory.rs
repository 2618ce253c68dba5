//! In-process connection.
//!
//! Keeps a fixed peer directory and records every send. An optional
//! responder answers sends synchronously, which makes it usable both as a
//! loopback backend and as a test double.

use crate::connection::Connection;
use crate::error::RelayError;
use crate::inbound::InboundHub;
use async_trait::async_trait;
use chatbridge_core::{PeerHandle, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Produces the peer's answer to a sent message, if it answers at all.
pub type Responder = Box<dyn Fn(&PeerHandle, &str) -> Option<String> + Send + Sync>;

/// A message recorded by [`MemoryConnection::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub peer: PeerHandle,
    pub text: String,
}

/// Connection that never leaves the process.
pub struct MemoryConnection {
    peers: HashMap<String, PeerHandle>,
    sent: Mutex<Vec<SentMessage>>,
    hub: InboundHub,
    connected: AtomicBool,
    fail_sends: AtomicBool,
    responder: Option<Responder>,
}

impl MemoryConnection {
    /// Creates a connection with no peers and no responder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
            sent: Mutex::new(Vec::new()),
            hub: InboundHub::new(),
            connected: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            responder: None,
        }
    }

    /// A connection whose every peer echoes what it is sent.
    ///
    /// Any name resolves; the peer id is the name.
    #[must_use]
    pub fn echo() -> Self {
        Self::new().with_responder(|_, text| Some(text.to_string()))
    }

    /// Adds a peer to the directory.
    #[must_use]
    pub fn with_peer(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        let peer = PeerHandle::new(id, name);
        self.peers.insert(peer.name.clone(), peer);
        self
    }

    /// Installs a responder that answers sends.
    #[must_use]
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&PeerHandle, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_send_failure(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Delivers a message as if `sender_id` had sent it.
    pub fn inject(&self, sender_id: &str, text: impl Into<String>) -> bool {
        self.hub.deliver(sender_id, text)
    }

    /// Every message sent so far, oldest first.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Returns true once `connect` has run and `close` has not.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<(), RelayError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RelayError::transport("not connected").into())
        }
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("peers", &self.peers)
            .field("hub", &self.hub)
            .field("connected", &self.connected)
            .field("responder", &self.responder.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn connect(&self) -> Result<(), RelayError> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!(peers = self.peers.len(), "in-memory connection ready");
        }
        Ok(())
    }

    async fn resolve_peer(&self, name: &str) -> Result<PeerHandle, RelayError> {
        self.ensure_connected()?;
        let name = name.trim_start_matches('@');

        if let Some(peer) = self.peers.get(name) {
            return Ok(peer.clone());
        }
        if self.peers.is_empty() && self.responder.is_some() {
            return Ok(PeerHandle::new(name, name));
        }

        Err(RelayError::PeerResolution {
            peer: name.to_string(),
            details: "no such peer".to_string(),
        }
        .into())
    }

    async fn send(&self, peer: &PeerHandle, text: &str) -> Result<(), RelayError> {
        self.ensure_connected()?;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(RelayError::transport(format!("send to {peer} refused")).into());
        }

        self.sent.lock().await.push(SentMessage {
            peer: peer.clone(),
            text: text.to_string(),
        });
        debug!(peer = %peer, chars = text.chars().count(), "message sent");

        if let Some(answer) = self.responder.as_ref().and_then(|r| r(peer, text)) {
            self.hub.deliver(&peer.id, answer);
        }
        Ok(())
    }

    fn inbound(&self) -> &InboundHub {
        &self.hub
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.connected.store(false, Ordering::SeqCst);
        let abandoned = self.hub.abandon_all();
        info!(abandoned, "in-memory connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_known_peers_only() {
        let connection = MemoryConnection::new().with_peer("1", "helper_bot");
        connection.connect().await.unwrap();

        let peer = connection.resolve_peer("@helper_bot").await.unwrap();
        assert_eq!(peer.id, "1");

        let err = connection.resolve_peer("stranger").await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            RelayError::PeerResolution { .. }
        ));
    }

    #[tokio::test]
    async fn echo_resolves_any_name() {
        let connection = MemoryConnection::echo();
        connection.connect().await.unwrap();

        let peer = connection.resolve_peer("anyone").await.unwrap();
        assert_eq!(peer, PeerHandle::new("anyone", "anyone"));
    }

    #[tokio::test]
    async fn send_requires_connect() {
        let connection = MemoryConnection::new().with_peer("1", "helper_bot");
        let peer = PeerHandle::new("1", "helper_bot");

        let err = connection.send(&peer, "hi").await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            RelayError::Transport { .. }
        ));
        assert!(connection.sent().await.is_empty());
    }

    #[tokio::test]
    async fn responder_answers_armed_watch() {
        let connection = MemoryConnection::new()
            .with_peer("1", "helper_bot")
            .with_responder(|_, text| Some(text.to_uppercase()));
        connection.connect().await.unwrap();
        let peer = connection.resolve_peer("helper_bot").await.unwrap();

        let mut watch = connection.inbound().watch(&peer.id);
        connection.send(&peer, "hello").await.unwrap();

        assert_eq!(watch.recv().await.unwrap().text, "HELLO");
        assert_eq!(
            connection.sent().await,
            vec![SentMessage {
                peer,
                text: "hello".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let connection = MemoryConnection::new().with_peer("1", "helper_bot");
        connection.connect().await.unwrap();
        connection.set_send_failure(true);

        let peer = PeerHandle::new("1", "helper_bot");
        assert!(connection.send(&peer, "hi").await.is_err());

        connection.set_send_failure(false);
        assert!(connection.send(&peer, "hi").await.is_ok());
    }

    #[tokio::test]
    async fn close_abandons_watchers() {
        let connection = MemoryConnection::echo();
        connection.connect().await.unwrap();
        let mut watch = connection.inbound().watch("bot");

        connection.close().await.unwrap();

        assert!(!connection.is_connected());
        assert!(watch.recv().await.is_none());
    }
}
