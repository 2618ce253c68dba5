//! The messaging backend contract.
//!
//! A connection owns the one shared link to the backend. Sends go out
//! through [`Connection::send`]; every inbound `(sender, text)` event is
//! handed to the connection's [`InboundHub`], where correlators wait for it.

use crate::error::RelayError;
use crate::inbound::InboundHub;
use async_trait::async_trait;
use chatbridge_core::{PeerHandle, Result};

/// A shared connection to the messaging backend.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Establishes the link. Calling it on a connected link does nothing.
    async fn connect(&self) -> Result<(), RelayError>;

    /// Looks up a peer by name.
    ///
    /// Fails with `PeerResolution` if the backend has no such peer.
    async fn resolve_peer(&self, name: &str) -> Result<PeerHandle, RelayError>;

    /// Sends text to a peer.
    async fn send(&self, peer: &PeerHandle, text: &str) -> Result<(), RelayError>;

    /// Where inbound messages are delivered.
    fn inbound(&self) -> &InboundHub;

    /// Releases the link. Watchers still armed are abandoned.
    async fn close(&self) -> Result<(), RelayError>;
}
