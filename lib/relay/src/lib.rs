//! Turn dispatch for chatbridge.
//!
//! This crate bridges stateless request/response turns onto a single shared,
//! asynchronous messaging connection:
//!
//! - **Connection**: the contract a messaging backend implements, with NATS
//!   and in-memory implementations
//! - **Inbound hub**: routes each inbound message to at most one armed watcher
//! - **Correlator**: pairs one send with the next reply from the same peer
//!   under a deadline
//! - **Dispatcher**: runs a full turn and reports its telemetry

pub mod connection;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod inbound;
pub mod memory;
pub mod nats;

pub use connection::Connection;
pub use correlator::{PendingCorrelation, Reply, wait_for_reply};
pub use dispatcher::{
    DEFAULT_REPLY_TIMEOUT, Dispatcher, DispatcherConfig, TurnResult, TurnTelemetry,
};
pub use error::RelayError;
pub use inbound::{InboundHub, InboundMessage, Watch};
pub use memory::{MemoryConnection, SentMessage};
pub use nats::{NatsConfig, NatsConnection};
