//! NATS-backed connection.
//!
//! Subjects live under a configurable prefix:
//!
//! - `<prefix>.outbound.<peer_id>`: text sent to a peer
//! - `<prefix>.inbound.<peer_id>`: text received from a peer, subscribed
//!   with a single wildcard
//! - `<prefix>.peers.resolve`: request/reply peer lookup; the request payload
//!   is the peer name and the reply is `{"id": ..., "name": ...}`
//!
//! One client and one subscription serve every turn. A pump task feeds each
//! inbound message into the [`InboundHub`].

use crate::connection::Connection;
use crate::error::RelayError;
use crate::inbound::InboundHub;
use async_nats::client::RequestErrorKind;
use async_nats::{Client, ConnectOptions, Subscriber};
use async_trait::async_trait;
use chatbridge_core::{PeerHandle, Result};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Default subject prefix.
const SUBJECT_PREFIX: &str = "chatbridge";

/// Client name reported to the server.
const CLIENT_NAME: &str = "chatbridge";

/// Configuration for the NATS connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
    /// Subject prefix (defaults to `chatbridge`).
    pub subject_prefix: Option<String>,
}

impl NatsConfig {
    /// Creates a new config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subject_prefix: None,
        }
    }

    #[must_use]
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = Some(prefix.into());
        self
    }

    fn prefix(&self) -> &str {
        self.subject_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(SUBJECT_PREFIX)
    }

    fn outbound_subject(&self, peer_id: &str) -> String {
        format!("{}.outbound.{peer_id}", self.prefix())
    }

    fn inbound_wildcard(&self) -> String {
        format!("{}.inbound.*", self.prefix())
    }

    fn resolve_subject(&self) -> String {
        format!("{}.peers.resolve", self.prefix())
    }

    /// Extracts the sender id from an inbound subject.
    fn sender_of<'s>(&self, subject: &'s str) -> Option<&'s str> {
        subject
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix(".inbound."))
            .filter(|id| !id.is_empty() && !id.contains('.'))
    }
}

#[derive(Debug, Deserialize)]
struct ResolvedPeer {
    id: String,
    name: String,
}

fn parse_resolved(name: &str, payload: &[u8]) -> Result<PeerHandle, RelayError> {
    let failed = |details: String| RelayError::PeerResolution {
        peer: name.to_string(),
        details,
    };

    if payload.is_empty() {
        return Err(failed("peer not found".to_string()).into());
    }
    let resolved: ResolvedPeer =
        serde_json::from_slice(payload).map_err(|e| failed(format!("bad resolve reply: {e}")))?;
    if resolved.id.is_empty() {
        return Err(failed("resolve reply has no id".to_string()).into());
    }

    Ok(PeerHandle::new(resolved.id, resolved.name))
}

#[derive(Debug)]
struct Link {
    client: Client,
    pump: JoinHandle<()>,
}

/// Connection over a NATS server.
#[derive(Debug)]
pub struct NatsConnection {
    config: NatsConfig,
    hub: Arc<InboundHub>,
    link: RwLock<Option<Link>>,
}

impl NatsConnection {
    /// Creates an unconnected NATS connection.
    #[must_use]
    pub fn new(config: NatsConfig) -> Self {
        Self {
            config,
            hub: Arc::new(InboundHub::new()),
            link: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    async fn client(&self) -> Result<Client, RelayError> {
        self.link
            .read()
            .await
            .as_ref()
            .map(|link| link.client.clone())
            .ok_or_else(|| RelayError::transport("not connected").into())
    }

    fn spawn_pump(&self, mut subscriber: Subscriber) -> JoinHandle<()> {
        let hub = Arc::clone(&self.hub);
        let config = self.config.clone();
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let Some(sender) = config.sender_of(message.subject.as_str()) else {
                    debug!(subject = %message.subject, "ignoring message on unexpected subject");
                    continue;
                };
                let text = String::from_utf8_lossy(&message.payload).into_owned();
                hub.deliver(sender, text);
            }
            warn!("inbound subscription ended");
        })
    }
}

#[async_trait]
impl Connection for NatsConnection {
    #[instrument(skip(self), fields(url = %self.config.url))]
    async fn connect(&self) -> Result<(), RelayError> {
        let mut link = self.link.write().await;
        if link.is_some() {
            return Ok(());
        }

        let client = ConnectOptions::new()
            .name(CLIENT_NAME)
            .connect(&self.config.url)
            .await
            .map_err(|e| RelayError::transport(format!("failed to connect: {e}")))?;

        let subject = self.config.inbound_wildcard();
        let subscriber = client
            .subscribe(subject.clone())
            .await
            .map_err(|e| RelayError::transport(format!("failed to subscribe: {e}")))?;

        let pump = self.spawn_pump(subscriber);
        *link = Some(Link { client, pump });
        info!(subject, "connected to NATS");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn resolve_peer(&self, name: &str) -> Result<PeerHandle, RelayError> {
        let client = self.client().await?;
        let name = name.trim_start_matches('@');

        let response = client
            .request(self.config.resolve_subject(), name.to_string().into())
            .await
            .map_err(|e| {
                let details = match e.kind() {
                    RequestErrorKind::NoResponders => "no peer directory responded".to_string(),
                    RequestErrorKind::TimedOut => "peer directory timed out".to_string(),
                    _ => e.to_string(),
                };
                RelayError::PeerResolution {
                    peer: name.to_string(),
                    details,
                }
            })?;

        let peer = parse_resolved(name, &response.payload)?;
        debug!(peer = %peer, "peer resolved");
        Ok(peer)
    }

    #[instrument(skip(self, text), fields(peer = %peer))]
    async fn send(&self, peer: &PeerHandle, text: &str) -> Result<(), RelayError> {
        let client = self.client().await?;

        client
            .publish(self.config.outbound_subject(&peer.id), text.to_string().into())
            .await
            .map_err(|e| RelayError::transport(format!("failed to publish: {e}")))?;
        client
            .flush()
            .await
            .map_err(|e| RelayError::transport(format!("failed to flush: {e}")))?;

        debug!(chars = text.chars().count(), "message sent");
        Ok(())
    }

    fn inbound(&self) -> &InboundHub {
        &self.hub
    }

    async fn close(&self) -> Result<(), RelayError> {
        let Some(link) = self.link.write().await.take() else {
            return Ok(());
        };

        link.pump.abort();
        let abandoned = self.hub.abandon_all();
        info!(abandoned, "NATS connection closed");

        link.client
            .flush()
            .await
            .map_err(|e| RelayError::transport(format!("failed to flush on close: {e}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_subjects() {
        let config = NatsConfig::new("nats://localhost:4222");
        assert_eq!(config.outbound_subject("42"), "chatbridge.outbound.42");
        assert_eq!(config.inbound_wildcard(), "chatbridge.inbound.*");
        assert_eq!(config.resolve_subject(), "chatbridge.peers.resolve");
    }

    #[test]
    fn custom_prefix() {
        let config = NatsConfig::new("nats://localhost:4222").with_subject_prefix("relay.dev");
        assert_eq!(config.outbound_subject("7"), "relay.dev.outbound.7");
        assert_eq!(config.inbound_wildcard(), "relay.dev.inbound.*");
    }

    #[test]
    fn empty_prefix_falls_back_to_default() {
        let config = NatsConfig::new("nats://localhost:4222").with_subject_prefix("");
        assert_eq!(config.resolve_subject(), "chatbridge.peers.resolve");
    }

    #[test]
    fn sender_is_last_inbound_token() {
        let config = NatsConfig::new("nats://localhost:4222");
        assert_eq!(config.sender_of("chatbridge.inbound.42"), Some("42"));
        assert_eq!(config.sender_of("chatbridge.inbound."), None);
        assert_eq!(config.sender_of("chatbridge.outbound.42"), None);
        assert_eq!(config.sender_of("other.inbound.42"), None);
    }

    #[test]
    fn parses_resolve_reply() {
        let peer = parse_resolved("helper_bot", br#"{"id": "42", "name": "helper_bot"}"#).unwrap();
        assert_eq!(peer, PeerHandle::new("42", "helper_bot"));
    }

    #[test]
    fn empty_or_malformed_resolve_reply_fails() {
        for payload in [&b""[..], b"not json", br#"{"id": "", "name": "x"}"#] {
            let err = parse_resolved("helper_bot", payload).unwrap_err();
            assert!(matches!(
                err.current_context(),
                RelayError::PeerResolution { .. }
            ));
        }
    }

    #[tokio::test]
    async fn operations_before_connect_fail() {
        let connection = NatsConnection::new(NatsConfig::new("nats://localhost:4222"));
        let peer = PeerHandle::new("42", "helper_bot");

        let err = connection.send(&peer, "hi").await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            RelayError::Transport { .. }
        ));
        assert!(connection.close().await.is_ok());
    }
}
