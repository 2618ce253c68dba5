//! The history directory: sequence allocation, listing, and lookup.

use crate::entry::{TranscriptEntry, TranscriptSnapshot};
use crate::error::TranscriptError;
use crate::logger::TranscriptLogger;
use crate::naming::TranscriptName;
use chrono::{Local, NaiveDate};
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A transcript found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSummary {
    pub name: TranscriptName,
    /// Markdown file name, e.g. `2025-03-20_chat_1.md`.
    pub file_name: String,
    pub path: PathBuf,
}

/// A persisted transcript with its structured entries merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRecord {
    pub name: TranscriptName,
    pub file_name: String,
    /// Full Markdown log.
    pub content: String,
    /// Entries from the JSON snapshot; empty when no snapshot was written.
    pub messages: Vec<TranscriptEntry>,
}

/// Owns the history directory and the per-day sequence counters.
///
/// The first logger created for a date seeds that date's counter from the
/// highest sequence already on disk. After that the counter is the source of
/// truth for this process. Markdown files are created exclusively, so a
/// number taken by another process in the meantime is skipped rather than
/// overwritten.
#[derive(Debug)]
pub struct TranscriptStore {
    dir: PathBuf,
    next_sequence: Mutex<HashMap<NaiveDate, u32>>,
}

impl TranscriptStore {
    /// Opens a history directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, Report<TranscriptError>> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| TranscriptError::io(&dir, &e))?;

        info!(dir = %dir.display(), "transcript store opened");
        Ok(Self {
            dir,
            next_sequence: Mutex::new(HashMap::new()),
        })
    }

    /// The history directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Starts a transcript dated today (local calendar).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be scanned or the Markdown
    /// file cannot be created.
    pub async fn create_logger(
        &self,
        owner: &str,
    ) -> Result<TranscriptLogger, Report<TranscriptError>> {
        self.create_logger_on(owner, Local::now().date_naive()).await
    }

    /// Starts a transcript for a specific date.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be scanned or the Markdown
    /// file cannot be created.
    pub async fn create_logger_on(
        &self,
        owner: &str,
        date: NaiveDate,
    ) -> Result<TranscriptLogger, Report<TranscriptError>> {
        let (name, file) = {
            let mut counters = self.next_sequence.lock().await;
            let mut sequence = match counters.get(&date) {
                Some(next) => *next,
                None => self.max_sequence_on(date).await? + 1,
            };

            loop {
                let name = TranscriptName::new(date, sequence);
                let path = self.dir.join(name.markdown_file_name());
                match OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await
                {
                    Ok(file) => {
                        counters.insert(date, sequence + 1);
                        break (name, file);
                    }
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        debug!(transcript = %name, "sequence taken on disk, skipping");
                        sequence += 1;
                    }
                    Err(e) => return Err(TranscriptError::io(&path, &e).into()),
                }
            }
        };

        TranscriptLogger::start(file, &self.dir, owner, name).await
    }

    async fn max_sequence_on(&self, date: NaiveDate) -> Result<u32, TranscriptError> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter(|name| name.date() == date)
            .map(|name| name.sequence())
            .max()
            .unwrap_or(0))
    }

    /// Every transcript name with at least one artifact on disk.
    async fn scan(&self) -> Result<Vec<TranscriptName>, TranscriptError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TranscriptError::io(&self.dir, &e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TranscriptError::io(&self.dir, &e))?
        {
            if let Some(name) = entry.file_name().to_str().and_then(TranscriptName::from_file_name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Lists Markdown transcripts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn list(&self) -> Result<Vec<TranscriptSummary>, Report<TranscriptError>> {
        let mut names: Vec<TranscriptName> = self.scan().await?;
        names.sort_unstable_by(|a, b| b.cmp(a));
        names.dedup();

        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            let file_name = name.markdown_file_name();
            let path = self.dir.join(&file_name);
            if fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                summaries.push(TranscriptSummary {
                    name,
                    file_name,
                    path,
                });
            }
        }
        Ok(summaries)
    }

    /// Loads one transcript, merging the JSON entries when a snapshot exists.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no Markdown log under `name`, or an
    /// I/O or decoding error if either file cannot be read.
    pub async fn fetch(
        &self,
        name: TranscriptName,
    ) -> Result<TranscriptRecord, Report<TranscriptError>> {
        let file_name = name.markdown_file_name();
        let markdown_path = self.dir.join(&file_name);
        let content = match fs::read_to_string(&markdown_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TranscriptError::NotFound { name }.into());
            }
            Err(e) => return Err(TranscriptError::io(&markdown_path, &e).into()),
        };

        let json_path = self.dir.join(name.json_file_name());
        let messages = match fs::read(&json_path).await {
            Ok(bytes) => {
                let snapshot: TranscriptSnapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| TranscriptError::serialize(&json_path, &e))?;
                snapshot.messages
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(TranscriptError::io(&json_path, &e).into()),
        };

        Ok(TranscriptRecord {
            name,
            file_name,
            content,
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    #[tokio::test]
    async fn nth_creation_receives_n() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();

        for n in 1..=5 {
            let logger = store.create_logger_on("bot", day(20)).await.unwrap();
            assert_eq!(logger.name().sequence(), n);
        }
    }

    #[tokio::test]
    async fn sequences_are_scoped_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();

        store.create_logger_on("bot", day(20)).await.unwrap();
        store.create_logger_on("bot", day(20)).await.unwrap();
        let other_day = store.create_logger_on("bot", day(21)).await.unwrap();

        assert_eq!(other_day.name().sequence(), 1);
    }

    #[tokio::test]
    async fn seeds_from_highest_existing_sequence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2025-03-20_chat_3.md"), "old").unwrap();
        std::fs::write(dir.path().join("2025-03-20_chat_9.json"), "{}").unwrap();
        std::fs::write(dir.path().join("2025-03-19_chat_40.md"), "older").unwrap();

        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let logger = store.create_logger_on("bot", day(20)).await.unwrap();

        assert_eq!(logger.name().sequence(), 10);
    }

    #[tokio::test]
    async fn skips_numbers_taken_by_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        store.create_logger_on("bot", day(20)).await.unwrap();

        std::fs::write(dir.path().join("2025-03-20_chat_2.md"), "elsewhere").unwrap();

        let logger = store.create_logger_on("bot", day(20)).await.unwrap();
        assert_eq!(logger.name().sequence(), 3);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("2025-03-20_chat_2.md")).unwrap(),
            "elsewhere"
        );
    }

    #[tokio::test]
    async fn concurrent_creations_get_distinct_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TranscriptStore::open(dir.path()).await.unwrap());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .create_logger_on("bot", day(20))
                        .await
                        .unwrap()
                        .name()
                        .sequence()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }
        assert_eq!(seen, (1..=16).collect());
    }

    #[tokio::test]
    async fn lists_newest_first_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2025-03-20_chat_9.md",
            "2025-03-20_chat_10.md",
            "2025-03-20_chat_10.json",
            "2025-03-21_chat_1.md",
            "2025-03-19_chat_2.json",
            "README.md",
        ] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }

        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let listed: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.file_name)
            .collect();

        assert_eq!(
            listed,
            vec![
                "2025-03-21_chat_1.md",
                "2025-03-20_chat_10.md",
                "2025-03-20_chat_9.md",
            ]
        );
    }

    #[tokio::test]
    async fn fetch_merges_snapshot_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let mut logger = store.create_logger_on("bot", day(20)).await.unwrap();
        logger.append_user("ping").await.unwrap();
        logger.append_assistant("pong").await.unwrap();
        logger.snapshot().await.unwrap();

        let record = store.fetch(logger.name()).await.unwrap();
        assert_eq!(record.file_name, "2025-03-20_chat_1.md");
        assert!(record.content.contains("**bot**: pong"));
        assert_eq!(
            record.messages,
            vec![TranscriptEntry::user("ping"), TranscriptEntry::assistant("pong")]
        );
    }

    #[tokio::test]
    async fn fetch_without_snapshot_has_no_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let mut logger = store.create_logger_on("bot", day(20)).await.unwrap();
        logger.append_user("unanswered").await.unwrap();

        let record = store.fetch(logger.name()).await.unwrap();
        assert!(record.content.contains("**You**: unanswered"));
        assert!(record.messages.is_empty());
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).await.unwrap();
        let name = TranscriptName::new(day(20), 1);

        let err = store.fetch(name).await.unwrap_err();
        assert_eq!(err.current_context(), &TranscriptError::NotFound { name });
    }
}
