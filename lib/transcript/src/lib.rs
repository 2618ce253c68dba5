//! Transcript persistence for chatbridge.
//!
//! Every conversation keeps two synchronized records on disk:
//!
//! - **Markdown log**: human-readable, append-only, written line by line as
//!   turns happen (`{date}_chat_{n}.md`)
//! - **JSON snapshot**: the structured list of entries, fully rewritten on
//!   every snapshot (`{date}_chat_{n}.json`)
//!
//! [`TranscriptStore`] owns the history directory, hands out per-day
//! sequence numbers, and lists or fetches persisted transcripts.
//! [`TranscriptLogger`] writes one conversation's pair of files.

pub mod entry;
pub mod error;
pub mod logger;
pub mod naming;
pub mod store;

pub use entry::{Role, TranscriptEntry, TranscriptSnapshot};
pub use error::TranscriptError;
pub use logger::TranscriptLogger;
pub use naming::TranscriptName;
pub use store::{TranscriptRecord, TranscriptStore, TranscriptSummary};
