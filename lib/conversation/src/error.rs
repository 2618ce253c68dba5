//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SessionError`: wraps transcript failures with the session they hit
//! - `ConversationError`: malformed caller input

use chatbridge_core::ConversationId;
use std::fmt;

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The transcript for a new session could not be created (use as context wrapper).
    TranscriptUnavailable { session_id: ConversationId },
    /// Closing a session's transcript failed (use as context wrapper).
    CloseFailed { session_id: ConversationId },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TranscriptUnavailable { session_id } => {
                write!(f, "could not start transcript for session {session_id}")
            }
            Self::CloseFailed { session_id } => {
                write!(f, "could not close transcript for session {session_id}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors in caller-supplied conversation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// Invalid message list.
    InvalidMessage { reason: String },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMessage { reason } => write!(f, "invalid message: {reason}"),
        }
    }
}

impl std::error::Error for ConversationError {}
