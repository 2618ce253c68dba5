//! Conversation sessions.
//!
//! A session is one logical multi-turn exchange. It is bound to a single
//! peer for its whole lifetime and owns the transcript of its turns.

use chatbridge_core::{ConversationId, PeerHandle};
use chatbridge_transcript::TranscriptLogger;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::sync::Mutex;

/// A live conversation session. Held only in process memory.
#[derive(Debug)]
pub struct ConversationSession {
    id: ConversationId,
    created_at: DateTime<Utc>,
    peer: OnceLock<PeerHandle>,
    log_path: PathBuf,
    transcript: Mutex<TranscriptLogger>,
}

impl ConversationSession {
    /// Creates a session around a freshly started transcript.
    #[must_use]
    pub fn new(id: ConversationId, transcript: TranscriptLogger) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            peer: OnceLock::new(),
            log_path: transcript.markdown_path().to_path_buf(),
            transcript: Mutex::new(transcript),
        }
    }

    /// The session's conversation id.
    #[must_use]
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// When the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The bound peer, if one has been resolved yet.
    #[must_use]
    pub fn peer(&self) -> Option<&PeerHandle> {
        self.peer.get()
    }

    /// Binds the session to a peer.
    ///
    /// The first binding wins; later calls leave it unchanged and return the
    /// peer already bound.
    pub fn bind_peer(&self, peer: PeerHandle) -> &PeerHandle {
        self.peer.get_or_init(|| peer)
    }

    /// Path of the human-readable transcript.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// The session's transcript logger.
    ///
    /// Hold the guard only for transcript writes, never across a wait for a
    /// reply.
    #[must_use]
    pub fn transcript(&self) -> &Mutex<TranscriptLogger> {
        &self.transcript
    }
}
