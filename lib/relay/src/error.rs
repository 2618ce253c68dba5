//! Error types for the relay crate.
//!
//! Each variant is a distinct signal so callers can tell a turn that was
//! never sent (`PeerResolution`, `Transport`) from one that was sent but got
//! no reply (`DeadlineExceeded`) and one that was answered but not durably
//! logged (`Storage`).

use chatbridge_core::ConversationId;
use std::fmt;
use std::time::Duration;

/// Errors from connection and dispatch operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Required identity is missing at startup. Fatal.
    Configuration { reason: String },
    /// The peer could not be found on the backend.
    PeerResolution { peer: String, details: String },
    /// No reply arrived from the peer before the deadline.
    DeadlineExceeded { peer: String, timeout: Duration },
    /// Connecting or sending failed, or the connection closed mid-wait.
    Transport { details: String },
    /// Transcript storage failed (use as context wrapper).
    Storage { session_id: Option<ConversationId> },
    /// The request itself is malformed.
    InvalidRequest { reason: String },
}

impl RelayError {
    pub(crate) fn transport(details: impl fmt::Display) -> Self {
        Self::Transport {
            details: details.to_string(),
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { reason } => write!(f, "configuration error: {reason}"),
            Self::PeerResolution { peer, details } => {
                write!(f, "could not resolve peer '{peer}': {details}")
            }
            Self::DeadlineExceeded { peer, timeout } => {
                write!(f, "no reply from '{peer}' within {}ms", timeout.as_millis())
            }
            Self::Transport { details } => write!(f, "transport error: {details}"),
            Self::Storage {
                session_id: Some(session_id),
            } => write!(f, "transcript storage failed for session {session_id}"),
            Self::Storage { session_id: None } => write!(f, "transcript storage failed"),
            Self::InvalidRequest { reason } => write!(f, "invalid request: {reason}"),
        }
    }
}

impl std::error::Error for RelayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_display() {
        let err = RelayError::DeadlineExceeded {
            peer: "helper_bot".to_string(),
            timeout: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "no reply from 'helper_bot' within 2000ms");
    }

    #[test]
    fn storage_display_names_session() {
        let session_id = ConversationId::new();
        let err = RelayError::Storage {
            session_id: Some(session_id),
        };
        assert!(err.to_string().contains(&session_id.to_string()));
    }
}
