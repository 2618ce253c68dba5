//! chatbridge HTTP server.
//!
//! Exposes an Ollama-compatible API whose "model" is a peer on a messaging
//! backend, plus read access to the stored conversation transcripts.

pub mod app;
pub mod config;
pub mod error;
