//! Core types shared across the chatbridge workspace.
//!
//! This crate provides the foundational identifiers, the peer handle, and the
//! error-handling alias used by the transcript, conversation, and relay crates.

pub mod error;
pub mod id;
pub mod peer;

pub use error::Result;
pub use id::{ConversationId, ParseIdError, TurnId};
pub use peer::PeerHandle;
