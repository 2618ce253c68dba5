//! Turn dispatch.
//!
//! A turn resolves (or creates) the caller's session, sends the composed
//! prompt to the session's peer, waits for the peer's reply and records both
//! sides in the session transcript. Turns on different sessions run fully in
//! parallel; the transcript lock is held only around file writes.

use crate::connection::Connection;
use crate::correlator::PendingCorrelation;
use crate::error::RelayError;
use chatbridge_conversation::{ChatMessage, ChatTurn, ConversationSession, SessionRegistry};
use chatbridge_core::{ConversationId, PeerHandle, Result, TurnId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Span, field, info, instrument};

/// How long a turn waits for the peer by default.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(300);

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Name of the peer every new session is bound to.
    pub peer_name: String,
    pub reply_timeout: Duration,
}

impl DispatcherConfig {
    /// Settings for `peer_name` with the default reply timeout.
    #[must_use]
    pub fn new(peer_name: impl Into<String>) -> Self {
        Self {
            peer_name: peer_name.into(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }
}

/// Timing and size of a completed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTelemetry {
    /// Whole turn, from session resolution to the final snapshot.
    pub total: Duration,
    /// From the send until the reply arrived.
    pub wait: Duration,
    /// Everything else: resolution, logging, sending.
    pub residual: Duration,
    /// Characters in the caller's prompt, excluding any preamble.
    pub prompt_chars: usize,
    pub reply_chars: usize,
}

/// Outcome of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub turn_id: TurnId,
    pub conversation_id: ConversationId,
    pub reply: String,
    /// Human-readable transcript of the conversation.
    pub log_path: PathBuf,
    pub telemetry: TurnTelemetry,
}

/// Runs turns against one connection and one session registry.
pub struct Dispatcher<C: Connection + ?Sized> {
    connection: Arc<C>,
    registry: Arc<SessionRegistry>,
    config: DispatcherConfig,
}

impl<C: Connection + ?Sized> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connection + ?Sized> Dispatcher<C> {
    /// Creates a dispatcher.
    ///
    /// A leading `@` on the peer name is ignored.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the peer name is empty.
    pub fn new(
        connection: Arc<C>,
        registry: Arc<SessionRegistry>,
        mut config: DispatcherConfig,
    ) -> Result<Self, RelayError> {
        let peer_name = config.peer_name.trim().trim_start_matches('@');
        if peer_name.is_empty() {
            return Err(RelayError::Configuration {
                reason: "peer name is required".to_string(),
            }
            .into());
        }
        config.peer_name = peer_name.to_string();

        Ok(Self {
            connection,
            registry,
            config,
        })
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Runs a single-prompt turn.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::handle_turn`].
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        conversation_id: Option<&str>,
    ) -> Result<TurnResult, RelayError> {
        self.handle_turn(conversation_id, prompt, system).await
    }

    /// Runs a turn from a chat message list.
    ///
    /// The last user message is the prompt; the first system message, if
    /// any, is the preamble.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if no user message is present, otherwise see
    /// [`Dispatcher::handle_turn`].
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        conversation_id: Option<&str>,
    ) -> Result<TurnResult, RelayError> {
        let turn = ChatTurn::from_messages(messages).map_err(|e| RelayError::InvalidRequest {
            reason: e.to_string(),
        })?;
        self.handle_turn(conversation_id, turn.prompt, turn.system)
            .await
    }

    /// Runs one turn.
    ///
    /// If the reply times out or the send fails, the user turn stays in the
    /// transcript with no assistant turn after it.
    ///
    /// # Errors
    ///
    /// - `PeerResolution` if a new session's peer cannot be found
    /// - `Transport` if the send fails
    /// - `DeadlineExceeded` if no reply arrives in time
    /// - `Storage` if the transcript cannot be written
    #[instrument(
        skip_all,
        fields(conversation_id = field::Empty, turn_id = field::Empty)
    )]
    pub async fn handle_turn(
        &self,
        conversation_id: Option<&str>,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<TurnResult, RelayError> {
        let started = Instant::now();
        let turn_id = TurnId::new();

        let resolved = self
            .registry
            .resolve(conversation_id)
            .await
            .map_err(|e| e.context(RelayError::Storage { session_id: None }))?;
        let session = resolved.session;
        let span = Span::current();
        span.record("conversation_id", field::display(session.id()));
        span.record("turn_id", field::display(turn_id));

        let peer = self.bind_peer(&session).await?;
        let composed = compose(prompt, system);

        session
            .transcript()
            .lock()
            .await
            .append_user(&composed)
            .await
            .map_err(|e| e.context(storage(&session)))?;

        let mut pending = PendingCorrelation::arm(&*self.connection, &peer);
        pending.mark_sent();
        self.connection.send(&peer, &composed).await?;
        let reply = pending.wait(self.config.reply_timeout).await?;

        {
            let mut transcript = session.transcript().lock().await;
            transcript
                .append_assistant(&reply.text)
                .await
                .map_err(|e| e.context(storage(&session)))?;
            transcript
                .snapshot()
                .await
                .map_err(|e| e.context(storage(&session)))?;
        }

        let total = started.elapsed();
        let telemetry = TurnTelemetry {
            total,
            wait: reply.latency,
            residual: total.saturating_sub(reply.latency),
            prompt_chars: prompt.chars().count(),
            reply_chars: reply.text.chars().count(),
        };
        info!(
            peer = %peer,
            total_ms = telemetry.total.as_millis() as u64,
            wait_ms = telemetry.wait.as_millis() as u64,
            "turn completed"
        );

        Ok(TurnResult {
            turn_id,
            conversation_id: session.id(),
            reply: reply.text,
            log_path: session.log_path().to_path_buf(),
            telemetry,
        })
    }

    async fn bind_peer(
        &self,
        session: &ConversationSession,
    ) -> Result<PeerHandle, RelayError> {
        if let Some(peer) = session.peer() {
            return Ok(peer.clone());
        }
        let peer = self.connection.resolve_peer(&self.config.peer_name).await?;
        Ok(session.bind_peer(peer).clone())
    }

    /// Closes every transcript, then the connection.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if closing it fails. Transcript close
    /// failures are logged only.
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        let closed = self.registry.close_all().await;
        info!(closed, "dispatcher shutting down");
        self.connection.close().await
    }
}

fn storage(session: &ConversationSession) -> RelayError {
    RelayError::Storage {
        session_id: Some(session.id()),
    }
}

/// Prefixes the prompt with the preamble and a blank line when one is given.
fn compose(prompt: &str, system: Option<&str>) -> String {
    match system {
        Some(preamble) if !preamble.is_empty() => format!("{preamble}\n\n{prompt}"),
        _ => prompt.to_string(),
    }
}
