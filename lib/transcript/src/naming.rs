//! Transcript file naming.
//!
//! A transcript is identified by its calendar date and a per-day sequence
//! number starting at 1. Both artifacts share the stem `{date}_chat_{n}`.

use crate::error::TranscriptError;
use chrono::NaiveDate;
use std::fmt;

/// Date format used in file names, headers, and snapshots.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const STEM_SEPARATOR: &str = "_chat_";
const MARKDOWN_EXTENSION: &str = "md";
const JSON_EXTENSION: &str = "json";

/// The `(date, sequence)` pair naming one transcript.
///
/// Ordering is by date, then sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TranscriptName {
    date: NaiveDate,
    sequence: u32,
}

impl TranscriptName {
    /// Creates a transcript name.
    #[must_use]
    pub const fn new(date: NaiveDate, sequence: u32) -> Self {
        Self { date, sequence }
    }

    /// Parses the textual date and sequence used in history lookups.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the date is not `YYYY-MM-DD` or the sequence
    /// is not a positive decimal integer without leading zeros.
    pub fn parse(date: &str, sequence: &str) -> Result<Self, TranscriptError> {
        let invalid = || TranscriptError::InvalidName {
            input: format!("{date}{STEM_SEPARATOR}{sequence}"),
        };

        let date = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| invalid())?;
        let sequence = parse_sequence(sequence).ok_or_else(invalid)?;
        Ok(Self::new(date, sequence))
    }

    /// Parses a file stem such as `2025-03-20_chat_3`.
    #[must_use]
    pub fn from_stem(stem: &str) -> Option<Self> {
        let (date, sequence) = stem.split_once(STEM_SEPARATOR)?;
        Self::parse(date, sequence).ok()
    }

    /// Parses a Markdown transcript file name such as `2025-03-20_chat_3.md`.
    #[must_use]
    pub fn from_markdown_file_name(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        if extension != MARKDOWN_EXTENSION {
            return None;
        }
        Self::from_stem(stem)
    }

    /// Parses either artifact's file name.
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        match extension {
            MARKDOWN_EXTENSION | JSON_EXTENSION => Self::from_stem(stem),
            _ => None,
        }
    }

    /// The calendar date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// The per-day sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The date rendered as `YYYY-MM-DD`.
    #[must_use]
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// The shared file stem.
    #[must_use]
    pub fn stem(&self) -> String {
        self.to_string()
    }

    /// File name of the human-readable log.
    #[must_use]
    pub fn markdown_file_name(&self) -> String {
        format!("{self}.{MARKDOWN_EXTENSION}")
    }

    /// File name of the structured snapshot.
    #[must_use]
    pub fn json_file_name(&self) -> String {
        format!("{self}.{JSON_EXTENSION}")
    }
}

impl fmt::Display for TranscriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{STEM_SEPARATOR}{}",
            self.date.format(DATE_FORMAT),
            self.sequence
        )
    }
}

fn parse_sequence(raw: &str) -> Option<u32> {
    if raw.is_empty() || raw.starts_with('0') || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn stem_and_file_names() {
        let name = TranscriptName::new(date(2025, 3, 20), 7);
        assert_eq!(name.stem(), "2025-03-20_chat_7");
        assert_eq!(name.markdown_file_name(), "2025-03-20_chat_7.md");
        assert_eq!(name.json_file_name(), "2025-03-20_chat_7.json");
    }

    #[test]
    fn parses_both_artifacts() {
        let expected = TranscriptName::new(date(2025, 3, 20), 12);
        assert_eq!(
            TranscriptName::from_file_name("2025-03-20_chat_12.md"),
            Some(expected)
        );
        assert_eq!(
            TranscriptName::from_file_name("2025-03-20_chat_12.json"),
            Some(expected)
        );
        assert_eq!(
            TranscriptName::from_markdown_file_name("2025-03-20_chat_12.json"),
            None
        );
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in [
            "2025-03-20_chat_.md",
            "2025-03-20_chat_0.md",
            "2025-03-20_chat_+3.md",
            "2025-03-20_chat_07.md",
            "2025-13-01_chat_1.md",
            "notes.md",
            "2025-03-20_chat_1.txt",
        ] {
            assert_eq!(TranscriptName::from_file_name(bad), None, "{bad}");
        }
    }

    #[test]
    fn parse_reports_input() {
        let err = TranscriptName::parse("yesterday", "1").unwrap_err();
        assert_eq!(
            err,
            TranscriptError::InvalidName {
                input: "yesterday_chat_1".to_string()
            }
        );
    }

    #[test]
    fn sequence_has_one_spelling() {
        assert!(TranscriptName::parse("2025-03-20", "7").is_ok());
        assert!(TranscriptName::parse("2025-03-20", "07").is_err());
        assert!(TranscriptName::parse("2025-03-20", "0").is_err());
    }

    #[test]
    fn orders_by_date_then_sequence() {
        let mut names = vec![
            TranscriptName::new(date(2025, 3, 20), 10),
            TranscriptName::new(date(2025, 3, 21), 1),
            TranscriptName::new(date(2025, 3, 20), 9),
        ];
        names.sort();
        assert_eq!(names[0].sequence(), 9);
        assert_eq!(names[1].sequence(), 10);
        assert_eq!(names[2].date(), date(2025, 3, 21));
    }
}
