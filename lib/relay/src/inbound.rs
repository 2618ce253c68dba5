//! Inbound message routing.
//!
//! Correlators register a one-shot [`Watch`] for a peer. When a message from
//! that peer arrives, the hub hands it to the oldest armed watch for that
//! peer and removes the registration. A watch that is dropped first (timeout,
//! cancellation, or success) removes its own registration, so no watcher
//! outlives its owner.
//!
//! Messages only reach watches registered before they arrived; a message
//! with no armed watch is discarded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

/// A message received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Backend id of the sending peer.
    pub sender_id: String,
    pub text: String,
    pub received_at: Instant,
}

#[derive(Debug)]
struct Watcher {
    peer_id: String,
    reply: oneshot::Sender<InboundMessage>,
}

/// Registry of armed watches. Keys increase with registration order.
#[derive(Debug, Default)]
pub struct InboundHub {
    next_key: AtomicU64,
    watchers: Mutex<BTreeMap<u64, Watcher>>,
}

impl InboundHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn watchers(&self) -> MutexGuard<'_, BTreeMap<u64, Watcher>> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms a watch for the next message from `peer_id`.
    pub fn watch(&self, peer_id: &str) -> Watch<'_> {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        self.watchers().insert(
            key,
            Watcher {
                peer_id: peer_id.to_string(),
                reply,
            },
        );

        Watch {
            hub: self,
            key,
            peer_id: peer_id.to_string(),
            receiver,
        }
    }

    /// Routes an inbound message to the oldest watch armed for its sender.
    ///
    /// A message resolves at most one watch. When several turns wait on the
    /// same peer they are answered in arming order, one message each, rather
    /// than every waiter receiving a copy of the same message.
    ///
    /// Returns true if a watch took the message.
    pub fn deliver(&self, sender_id: &str, text: impl Into<String>) -> bool {
        let mut message = InboundMessage {
            sender_id: sender_id.to_string(),
            text: text.into(),
            received_at: Instant::now(),
        };

        let mut watchers = self.watchers();
        loop {
            let Some(key) = watchers
                .iter()
                .find(|(_, w)| w.peer_id == sender_id)
                .map(|(key, _)| *key)
            else {
                debug!(sender_id, "inbound message with no armed watcher dropped");
                return false;
            };

            let Some(watcher) = watchers.remove(&key) else {
                continue;
            };
            match watcher.reply.send(message) {
                Ok(()) => {
                    debug!(sender_id, watch = key, "inbound message delivered");
                    return true;
                }
                // Receiver already gone; offer the message to the next watch.
                Err(returned) => message = returned,
            }
        }
    }

    /// Number of armed watches.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers().len()
    }

    /// Number of armed watches for one peer.
    #[must_use]
    pub fn watchers_for(&self, peer_id: &str) -> usize {
        self.watchers()
            .values()
            .filter(|w| w.peer_id == peer_id)
            .count()
    }

    /// Drops every armed watch. Their owners observe a closed channel.
    pub fn abandon_all(&self) -> usize {
        let mut watchers = self.watchers();
        let abandoned = watchers.len();
        watchers.clear();
        abandoned
    }

    fn release(&self, key: u64) -> bool {
        self.watchers().remove(&key).is_some()
    }
}

/// A registered interest in the next message from one peer.
///
/// Dropping the watch deregisters it.
#[derive(Debug)]
pub struct Watch<'a> {
    hub: &'a InboundHub,
    key: u64,
    peer_id: String,
    receiver: oneshot::Receiver<InboundMessage>,
}

impl Watch<'_> {
    /// The peer this watch is scoped to.
    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Waits for the message. Returns `None` if the hub abandoned the watch.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        (&mut self.receiver).await.ok()
    }
}

impl Drop for Watch<'_> {
    fn drop(&mut self) {
        if self.hub.release(self.key) {
            debug!(peer_id = %self.peer_id, watch = self.key, "watch released unresolved");
        }
    }
}
