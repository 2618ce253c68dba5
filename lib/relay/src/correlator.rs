//! Reply correlation.
//!
//! A correlation pairs one outbound send with the next inbound message from
//! the same peer. It is armed before the send so that a reply arriving while
//! the send is still in flight is not lost, then waited on under a deadline.
//! The underlying [`Watch`] deregisters itself on every exit path, including
//! the waiting future being dropped.

use crate::connection::Connection;
use crate::error::RelayError;
use crate::inbound::Watch;
use chatbridge_core::{PeerHandle, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A reply received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Time from the send to the reply's arrival.
    pub latency: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CorrelationState {
    Armed,
    Resolved,
    Expired,
    Abandoned,
}

/// An armed wait for one reply from one peer.
#[derive(Debug)]
pub struct PendingCorrelation<'a> {
    peer: PeerHandle,
    watch: Watch<'a>,
    armed_at: Instant,
    sent_at: Option<Instant>,
    state: CorrelationState,
}

impl<'a> PendingCorrelation<'a> {
    /// Registers a watcher for the next message from `peer`.
    pub fn arm<C: Connection + ?Sized>(connection: &'a C, peer: &PeerHandle) -> Self {
        Self {
            peer: peer.clone(),
            watch: connection.inbound().watch(&peer.id),
            armed_at: Instant::now(),
            sent_at: None,
            state: CorrelationState::Armed,
        }
    }

    /// The peer this correlation waits on.
    #[must_use]
    pub fn peer(&self) -> &PeerHandle {
        &self.peer
    }

    /// Records the send time that reply latency is measured from.
    ///
    /// Without it, latency is measured from when the correlation was armed.
    pub fn mark_sent(&mut self) {
        self.sent_at = Some(Instant::now());
    }

    /// Waits for the reply.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` if nothing arrives within `timeout`, or
    /// `Transport` if the connection abandoned the watch while closing.
    pub async fn wait(mut self, timeout: Duration) -> Result<Reply, RelayError> {
        let started = self.sent_at.unwrap_or(self.armed_at);

        match tokio::time::timeout(timeout, self.watch.recv()).await {
            Ok(Some(message)) => {
                self.state = CorrelationState::Resolved;
                let latency = message.received_at.saturating_duration_since(started);
                debug!(
                    peer = %self.peer,
                    latency_ms = latency.as_millis() as u64,
                    "reply correlated"
                );
                Ok(Reply {
                    text: message.text,
                    latency,
                })
            }
            Ok(None) => {
                self.state = CorrelationState::Abandoned;
                Err(RelayError::transport("connection closed while waiting for a reply").into())
            }
            Err(_) => {
                self.state = CorrelationState::Expired;
                Err(RelayError::DeadlineExceeded {
                    peer: self.peer.name.clone(),
                    timeout,
                }
                .into())
            }
        }
    }
}

impl Drop for PendingCorrelation<'_> {
    fn drop(&mut self) {
        if self.state == CorrelationState::Armed {
            debug!(peer = %self.peer, "correlation cancelled before a reply");
        }
    }
}

/// Arms a correlation for `peer` and waits for its reply.
///
/// Only messages arriving after this call are considered, and latency is
/// measured from the call.
///
/// # Errors
///
/// See [`PendingCorrelation::wait`].
pub async fn wait_for_reply<C: Connection + ?Sized>(
    connection: &C,
    peer: &PeerHandle,
    timeout: Duration,
) -> Result<Reply, RelayError> {
    let mut pending = PendingCorrelation::arm(connection, peer);
    pending.mark_sent();
    pending.wait(timeout).await
}
