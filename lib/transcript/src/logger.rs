//! Per-conversation transcript writer.

use crate::entry::{Role, SnapshotRef, TranscriptEntry};
use crate::error::TranscriptError;
use crate::naming::TranscriptName;
use chrono::Local;
use rootcause::prelude::Report;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const ENDED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes one conversation's Markdown log and JSON snapshot.
///
/// Lines reach the Markdown file (flushed and synced) before an append
/// returns. The JSON file only changes on [`snapshot`](Self::snapshot) and
/// [`close`](Self::close), which rewrite it in full.
#[derive(Debug)]
pub struct TranscriptLogger {
    owner: String,
    name: TranscriptName,
    markdown_path: PathBuf,
    json_path: PathBuf,
    entries: Vec<TranscriptEntry>,
    closed: bool,
}

impl TranscriptLogger {
    /// Takes ownership of a freshly created Markdown file and writes the
    /// header into it.
    pub(crate) async fn start(
        file: File,
        dir: &Path,
        owner: &str,
        name: TranscriptName,
    ) -> Result<Self, Report<TranscriptError>> {
        let logger = Self {
            owner: owner.to_string(),
            name,
            markdown_path: dir.join(name.markdown_file_name()),
            json_path: dir.join(name.json_file_name()),
            entries: Vec::new(),
            closed: false,
        };

        let header = format!(
            "# Chat with @{owner}\n\nDate: {}\nChat Number: {}\n\n---\n\n",
            name.date_string(),
            name.sequence()
        );
        write_durably(file, &logger.markdown_path, &header).await?;

        debug!(transcript = %name, "transcript started");
        Ok(logger)
    }

    /// Name of the peer this transcript records.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The transcript's `(date, sequence)` name.
    #[must_use]
    pub fn name(&self) -> TranscriptName {
        self.name
    }

    /// Path to the human-readable log.
    #[must_use]
    pub fn markdown_path(&self) -> &Path {
        &self.markdown_path
    }

    /// Path to the structured snapshot.
    #[must_use]
    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Entries appended so far, in order.
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Returns true once [`close`](Self::close) has completed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Records a prompt sent to the peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the logger is closed or the write fails.
    pub async fn append_user(&mut self, text: &str) -> Result<(), Report<TranscriptError>> {
        self.append(TranscriptEntry::user(text)).await
    }

    /// Records a reply received from the peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the logger is closed or the write fails.
    pub async fn append_assistant(&mut self, text: &str) -> Result<(), Report<TranscriptError>> {
        self.append(TranscriptEntry::assistant(text)).await
    }

    async fn append(&mut self, entry: TranscriptEntry) -> Result<(), Report<TranscriptError>> {
        if self.closed {
            return Err(TranscriptError::Closed { name: self.name }.into());
        }

        let line = match entry.role {
            Role::User => format!("**You**: {}\n\n", entry.content),
            Role::Assistant => format!("**{}**: {}\n\n", self.owner, entry.content),
        };
        append_durably(&self.markdown_path, &line).await?;

        self.entries.push(entry);
        Ok(())
    }

    /// Rewrites the JSON snapshot with every entry buffered so far.
    ///
    /// Identical buffered entries always produce identical file contents.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub async fn snapshot(&self) -> Result<(), Report<TranscriptError>> {
        let snapshot = SnapshotRef {
            owner: &self.owner,
            date: self.name.date(),
            sequence: self.name.sequence(),
            messages: &self.entries,
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| TranscriptError::serialize(&self.json_path, &e))?;

        fs::write(&self.json_path, bytes)
            .await
            .map_err(|e| TranscriptError::io(&self.json_path, &e))?;

        debug!(transcript = %self.name, entries = self.entries.len(), "snapshot written");
        Ok(())
    }

    /// Writes a final snapshot and the end-of-chat footer.
    ///
    /// Closing an already closed logger does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails; the logger stays open so the
    /// close can be attempted again.
    pub async fn close(&mut self) -> Result<(), Report<TranscriptError>> {
        if self.closed {
            return Ok(());
        }

        self.snapshot().await?;

        let footer = format!(
            "\n---\n\nChat ended at: {}\n",
            Local::now().format(ENDED_AT_FORMAT)
        );
        append_durably(&self.markdown_path, &footer).await?;

        self.closed = true;
        debug!(transcript = %self.name, "transcript closed");
        Ok(())
    }
}

async fn append_durably(path: &Path, text: &str) -> Result<(), TranscriptError> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(|e| TranscriptError::io(path, &e))?;
    write_durably(file, path, text).await
}

async fn write_durably(mut file: File, path: &Path, text: &str) -> Result<(), TranscriptError> {
    file.write_all(text.as_bytes())
        .await
        .map_err(|e| TranscriptError::io(path, &e))?;
    file.flush().await.map_err(|e| TranscriptError::io(path, &e))?;
    file.sync_data()
        .await
        .map_err(|e| TranscriptError::io(path, &e))
}

#[cfg(test)]
mod tests {
    use crate::entry::TranscriptSnapshot;
    use crate::store::TranscriptStore;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 20).expect("valid date")
    }

    #[tokio::test]
    async fn header_is_written_on_creation() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let logger = store.create_logger_on("helper_bot", day()).await.unwrap();

        let content = std::fs::read_to_string(logger.markdown_path()).unwrap();
        assert_eq!(
            content,
            "# Chat with @helper_bot\n\nDate: 2025-03-20\nChat Number: 1\n\n---\n\n"
        );
        assert!(!logger.json_path().exists());
    }

    #[tokio::test]
    async fn hello_hi_close_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let mut logger = store.create_logger_on("helper_bot", day()).await.unwrap();

        logger.append_user("hello").await.unwrap();
        logger.append_assistant("hi").await.unwrap();
        logger.close().await.unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(logger.json_path()).unwrap()).unwrap();
        assert_eq!(
            json["messages"],
            serde_json::json!([
                {"role": "user", "content": "hello"},
                {"role": "assistant", "content": "hi"}
            ])
        );

        let markdown = std::fs::read_to_string(logger.markdown_path()).unwrap();
        let you = markdown.find("**You**: hello\n\n").expect("user line");
        let bot = markdown.find("**helper_bot**: hi\n\n").expect("assistant line");
        let footer = markdown.find("\n---\n\nChat ended at: ").expect("footer");
        assert!(you < bot && bot < footer);

        let ended_at = markdown[footer..]
            .trim_start_matches("\n---\n\nChat ended at: ")
            .trim_end();
        assert!(chrono::NaiveDateTime::parse_from_str(ended_at, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[tokio::test]
    async fn appends_are_durable_before_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let mut logger = store.create_logger_on("helper_bot", day()).await.unwrap();

        logger.append_user("are you there?").await.unwrap();

        let markdown = std::fs::read_to_string(logger.markdown_path()).unwrap();
        assert!(markdown.ends_with("**You**: are you there?\n\n"));
        assert_eq!(logger.entries().len(), 1);
        assert!(!logger.json_path().exists());
    }

    #[tokio::test]
    async fn snapshot_is_idempotent_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let mut logger = store.create_logger_on("helper_bot", day()).await.unwrap();
        logger.append_user("one").await.unwrap();
        logger.append_assistant("two").await.unwrap();

        logger.snapshot().await.unwrap();
        let first = std::fs::read(logger.json_path()).unwrap();
        logger.snapshot().await.unwrap();
        let second = std::fs::read(logger.json_path()).unwrap();
        assert_eq!(first, second);

        logger.append_user("three").await.unwrap();
        logger.snapshot().await.unwrap();
        let third: TranscriptSnapshot =
            serde_json::from_slice(&std::fs::read(logger.json_path()).unwrap()).unwrap();
        assert_eq!(third.messages.len(), 3);
        assert_eq!(third.sequence, 1);
        assert_eq!(third.owner, "helper_bot");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_later_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let mut logger = store.create_logger_on("helper_bot", day()).await.unwrap();

        logger.close().await.unwrap();
        let after_first = std::fs::read_to_string(logger.markdown_path()).unwrap();
        logger.close().await.unwrap();
        let after_second = std::fs::read_to_string(logger.markdown_path()).unwrap();

        assert!(logger.is_closed());
        assert_eq!(after_first, after_second);
        assert!(logger.append_user("late").await.is_err());
    }

    #[tokio::test]
    async fn write_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let mut logger = store.create_logger_on("helper_bot", day()).await.unwrap();

        std::fs::remove_file(logger.markdown_path()).unwrap();
        std::fs::create_dir(logger.markdown_path()).unwrap();

        assert!(logger.append_user("lost").await.is_err());
        assert!(logger.entries().is_empty());
    }
}
