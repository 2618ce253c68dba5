//! Chat messages submitted by callers.

use crate::error::ConversationError;
use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions prefixed to the outbound prompt.
    System,
    /// User/human message.
    User,
    /// Assistant reply from an earlier turn.
    Assistant,
}

/// A message in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

/// What a chat request contributes to one turn.
///
/// The backend keeps its own conversation state, so only the newest user
/// message is forwarded. The first system message, if any, becomes the
/// preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatTurn<'a> {
    pub prompt: &'a str,
    pub system: Option<&'a str>,
}

impl<'a> ChatTurn<'a> {
    /// Picks the prompt and preamble out of an ordered message list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessage` if no user message is present.
    pub fn from_messages(messages: &'a [ChatMessage]) -> Result<Self, ConversationError> {
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .ok_or_else(|| ConversationError::InvalidMessage {
                reason: "no user message found".to_string(),
            })?;

        let system = messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str());

        Ok(Self { prompt, system })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_user_message_is_the_prompt() {
        let messages = vec![
            ChatMessage::system("Answer briefly."),
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ];

        let turn = ChatTurn::from_messages(&messages).expect("has user message");
        assert_eq!(turn.prompt, "second");
        assert_eq!(turn.system, Some("Answer briefly."));
    }

    #[test]
    fn system_is_optional() {
        let messages = vec![ChatMessage::user("only")];
        let turn = ChatTurn::from_messages(&messages).expect("has user message");
        assert_eq!(turn.system, None);
    }

    #[test]
    fn missing_user_message_is_rejected() {
        let messages = vec![ChatMessage::system("x"), ChatMessage::assistant("y")];
        assert!(matches!(
            ChatTurn::from_messages(&messages),
            Err(ConversationError::InvalidMessage { .. })
        ));
    }

    #[test]
    fn roles_deserialize_lowercase() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"system","content":"be terse"}"#).expect("parse");
        assert_eq!(msg, ChatMessage::system("be terse"));
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let parsed = serde_json::from_str::<ChatMessage>(r#"{"role":"tool","content":"42"}"#);
        assert!(parsed.is_err());
    }
}
