//! Error types for the transcript crate.

use crate::naming::TranscriptName;
use std::fmt;
use std::path::{Path, PathBuf};

/// Errors from transcript persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    /// A filesystem operation failed.
    Io { path: PathBuf, details: String },
    /// The structured snapshot could not be encoded or decoded.
    Serialize { path: PathBuf, details: String },
    /// No transcript exists under the requested name.
    NotFound { name: TranscriptName },
    /// A date or sequence number could not be parsed into a transcript name.
    InvalidName { input: String },
    /// The logger was already closed.
    Closed { name: TranscriptName },
}

impl TranscriptError {
    pub(crate) fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            details: err.to_string(),
        }
    }

    pub(crate) fn serialize(path: &Path, err: &serde_json::Error) -> Self {
        Self::Serialize {
            path: path.to_path_buf(),
            details: err.to_string(),
        }
    }
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, details } => {
                write!(f, "transcript I/O failed for {}: {details}", path.display())
            }
            Self::Serialize { path, details } => {
                write!(
                    f,
                    "transcript snapshot encoding failed for {}: {details}",
                    path.display()
                )
            }
            Self::NotFound { name } => write!(f, "transcript not found: {name}"),
            Self::InvalidName { input } => write!(f, "invalid transcript name: {input}"),
            Self::Closed { name } => write!(f, "transcript {name} is already closed"),
        }
    }
}

impl std::error::Error for TranscriptError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn io_error_display_names_path() {
        let err = TranscriptError::io(
            Path::new("history/2025-03-20_chat_1.md"),
            &std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("2025-03-20_chat_1.md"));
    }

    #[test]
    fn not_found_display_uses_stem() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 20).expect("valid date");
        let err = TranscriptError::NotFound {
            name: TranscriptName::new(date, 4),
        };
        assert_eq!(err.to_string(), "transcript not found: 2025-03-20_chat_4");
    }
}
