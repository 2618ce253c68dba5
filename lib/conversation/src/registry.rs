//! The session registry.
//!
//! Maps opaque conversation ids to live sessions. Callers that present an
//! id the registry has never issued (or no id at all) get a brand-new
//! session with a fresh id and transcript.

use crate::error::SessionError;
use crate::session::ConversationSession;
use chatbridge_core::ConversationId;
use chatbridge_transcript::TranscriptStore;
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of [`SessionRegistry::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Arc<ConversationSession>,
    /// True when the session was created by this call.
    pub created: bool,
    /// True when no peer has been bound to the session yet.
    pub needs_peer: bool,
}

/// Process-wide map of live sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    owner: String,
    store: Arc<TranscriptStore>,
    sessions: Mutex<HashMap<ConversationId, Arc<ConversationSession>>>,
}

impl SessionRegistry {
    /// Creates an empty registry whose transcripts are written to `store`
    /// under `owner` (the peer's display name).
    #[must_use]
    pub fn new(owner: impl Into<String>, store: Arc<TranscriptStore>) -> Self {
        Self {
            owner: owner.into(),
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Name recorded as the other party in new transcripts.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The transcript store backing new sessions.
    #[must_use]
    pub fn store(&self) -> &Arc<TranscriptStore> {
        &self.store
    }

    /// Finds the session for `requested`, creating one if the id is absent,
    /// unparseable, or unknown.
    ///
    /// Resolving a known id returns the same session every time.
    ///
    /// # Errors
    ///
    /// Returns `TranscriptUnavailable` if a new session's transcript files
    /// cannot be created.
    pub async fn resolve(
        &self,
        requested: Option<&str>,
    ) -> Result<ResolvedSession, Report<SessionError>> {
        if let Some(raw) = requested {
            let existing = match raw.parse::<ConversationId>() {
                Ok(id) => self.sessions.lock().await.get(&id).cloned(),
                Err(_) => None,
            };
            if let Some(session) = existing {
                let needs_peer = session.peer().is_none();
                return Ok(ResolvedSession {
                    session,
                    created: false,
                    needs_peer,
                });
            }
            debug!(requested = raw, "unknown conversation id, starting a new session");
        }

        let id = self.mint_id().await;
        let logger = self
            .store
            .create_logger(&self.owner)
            .await
            .map_err(|e| e.context(SessionError::TranscriptUnavailable { session_id: id }))?;

        info!(
            conversation_id = %id,
            transcript = %logger.name(),
            "conversation started"
        );

        let session = Arc::new(ConversationSession::new(id, logger));
        self.sessions.lock().await.insert(id, Arc::clone(&session));

        Ok(ResolvedSession {
            session,
            created: true,
            needs_peer: true,
        })
    }

    async fn mint_id(&self) -> ConversationId {
        let sessions = self.sessions.lock().await;
        let mut id = ConversationId::new();
        while sessions.contains_key(&id) {
            id = ConversationId::new();
        }
        id
    }

    /// Looks up a live session without creating one.
    pub async fn get(&self, id: ConversationId) -> Option<Arc<ConversationSession>> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// Ids of every live session.
    pub async fn ids(&self) -> Vec<ConversationId> {
        self.sessions.lock().await.keys().copied().collect()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns true if no session has been created.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Closes every session's transcript (final snapshot plus footer).
    ///
    /// Failures are logged and do not stop the remaining closes. Returns how
    /// many transcripts closed cleanly.
    pub async fn close_all(&self) -> usize {
        let sessions: Vec<Arc<ConversationSession>> =
            self.sessions.lock().await.values().cloned().collect();

        let mut closed = 0;
        for session in sessions {
            let result = session.transcript().lock().await.close().await;
            match result {
                Ok(()) => closed += 1,
                Err(e) => {
                    let report = e.context(SessionError::CloseFailed {
                        session_id: session.id(),
                    });
                    warn!(error = %report, "failed to close transcript");
                }
            }
        }

        info!(closed, "transcripts closed");
        closed
    }
}
