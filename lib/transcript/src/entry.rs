//! Transcript entries and the structured snapshot format.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller's prompt, as sent to the peer.
    User,
    /// The peer's reply.
    Assistant,
}

/// One line of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

impl TranscriptEntry {
    /// Creates a user entry.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant entry.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Contents of a structured snapshot file.
///
/// Field names on disk are `bot`, `date`, `chat_number`, and `messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    /// Name of the peer the conversation was held with.
    #[serde(rename = "bot")]
    pub owner: String,
    pub date: NaiveDate,
    #[serde(rename = "chat_number")]
    pub sequence: u32,
    #[serde(default)]
    pub messages: Vec<TranscriptEntry>,
}

/// Borrowed form of [`TranscriptSnapshot`] used when writing.
#[derive(Serialize)]
pub(crate) struct SnapshotRef<'a> {
    #[serde(rename = "bot")]
    pub owner: &'a str,
    pub date: NaiveDate,
    #[serde(rename = "chat_number")]
    pub sequence: u32,
    pub messages: &'a [TranscriptEntry],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(TranscriptEntry::assistant("hi")).expect("serialize");
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn borrowed_and_owned_snapshots_agree() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 20).expect("valid date");
        let messages = vec![TranscriptEntry::user("hello")];
        let written = serde_json::to_string(&SnapshotRef {
            owner: "helper_bot",
            date,
            sequence: 2,
            messages: &messages,
        })
        .expect("serialize");

        let read: TranscriptSnapshot = serde_json::from_str(&written).expect("deserialize");
        assert_eq!(read.owner, "helper_bot");
        assert_eq!(read.date, date);
        assert_eq!(read.sequence, 2);
        assert_eq!(read.messages, messages);
        assert!(written.contains("\"chat_number\":2"));
        assert!(written.contains("\"date\":\"2025-03-20\""));
    }

    #[test]
    fn snapshot_without_messages_reads_as_empty() {
        let read: TranscriptSnapshot =
            serde_json::from_str(r#"{"bot":"b","date":"2025-03-20","chat_number":1}"#)
                .expect("deserialize");
        assert!(read.messages.is_empty());
    }
}
